//! Background stage workers.
//!
//! Each non-interactive stage entry runs `Handler::run` on its own thread.
//! The worker never touches the model: it sends a [`WorkerEvent`] back
//! over the controller's channel and exits.

use feedbacker_core::{Handler, StageContext, StageResult};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A handler shared between the controller and at most one worker.
pub type SharedHandler = Arc<Mutex<Box<dyn Handler>>>;

/// Completion of one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEvent {
    pub stage_id: String,

    /// `None` when the handler is not finished yet
    pub result: Option<StageResult>,
}

pub type WorkerSender = UnboundedSender<WorkerEvent>;
pub type WorkerReceiver = UnboundedReceiver<WorkerEvent>;

pub fn worker_channel() -> (WorkerSender, WorkerReceiver) {
    unbounded_channel()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a handler on a new named thread.
///
/// A panic inside `run` becomes a CRITICAL result.
pub fn spawn_worker(
    handler: SharedHandler,
    ctx: StageContext,
    events: WorkerSender,
) -> std::io::Result<JoinHandle<()>> {
    let stage_id = ctx.stage_id.clone();

    std::thread::Builder::new()
        .name(format!("stage-{}", stage_id))
        .spawn(move || {
            tracing::debug!(stage = %stage_id, "Worker started");

            let outcome = catch_unwind(AssertUnwindSafe(|| handler.lock().run(&ctx)));
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(stage = %stage_id, error = %message, "Stage handler panicked");
                    Some(StageResult::critical(format!(
                        "Stage handler panicked: {}",
                        message
                    )))
                }
            };

            if events.send(WorkerEvent { stage_id, result }).is_err() {
                tracing::warn!("Controller dropped before worker finished");
            }
        })
}
