//! Scoring one submission.
//!
//! Stages run strictly in order. Only `next_stage_id` may leave INACTIVE;
//! it is set when the previous stage completes. Non-interactive stages run
//! on background workers whose results are folded in by [`Scorer::pump`]
//! or [`Scorer::wait_for_workers`] on the controller's thread.

use super::{ActiveStage, Engine, StageController};
use crate::worker::{spawn_worker, worker_channel, WorkerEvent, WorkerReceiver, WorkerSender};
use feedbacker_core::handlers::{HandlerInput, HandlerVariant};
use feedbacker_core::model::{FEEDBACK_POST, FEEDBACK_PRE};
use feedbacker_core::{
    Config, HandlerRegistry, Model, Outcome, ResultKind, StageError, StageResult, StageState, View,
};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;

pub struct Scorer {
    engine: Engine,
    submission: String,
    next_stage_id: Option<String>,
    started: bool,
    events_tx: WorkerSender,
    events_rx: WorkerReceiver,
    in_flight: usize,
}

impl Scorer {
    pub fn new(
        config: Arc<Config>,
        handlers: &HandlerRegistry,
        model: Model,
        view: Box<dyn View>,
        submission: impl Into<String>,
    ) -> Result<Self, StageError> {
        let (events_tx, events_rx) = worker_channel();
        Ok(Self {
            engine: Engine::new(config, handlers, model, view)?,
            submission: submission.into(),
            next_stage_id: None,
            started: false,
            events_tx,
            events_rx,
            in_flight: 0,
        })
    }

    pub fn submission(&self) -> &str {
        &self.submission
    }

    /// The single stage currently allowed to leave INACTIVE.
    pub fn next_stage_id(&self) -> Option<&str> {
        self.next_stage_id.as_deref()
    }

    /// Clamped total score of the submission.
    pub fn score(&self) -> f64 {
        self.engine
            .model
            .score(&self.submission, &self.engine.score_bounds)
    }

    /// True if the submission was scored before.
    pub fn has_existing_results(&self) -> bool {
        self.engine.model.has_submission(&self.submission)
    }

    /// Forget earlier outcomes and feedback of this submission.
    pub fn reset_submission(&mut self) {
        if self.engine.model.remove_submission(&self.submission) {
            tracing::info!(submission = %self.submission, "Existing results cleared");
        }
        self.engine.view.set_score(self.score());
    }

    pub fn has_running_workers(&self) -> bool {
        self.in_flight > 0
    }

    pub fn into_model(self) -> Model {
        self.engine.into_model()
    }

    /// Store an outcome under its own id.
    pub fn set_outcome(&mut self, stage_id: &str, outcome: Outcome) {
        let outcome_id = outcome.outcome_id.clone();
        self.engine
            .model
            .outcomes
            .submission_mut(&self.submission)
            .stage_mut(stage_id)
            .set(&outcome_id, outcome);
        self.engine.view.set_score(self.score());
    }

    pub fn add_feedback(&mut self, stage_id: &str, feedback_id: &str, text: &str) {
        self.engine
            .model
            .feedback
            .submission_mut(&self.submission)
            .stage_mut(stage_id)
            .set(feedback_id, text);
    }

    fn remove_outcome(&mut self, stage_id: &str, outcome_id: &str) {
        self.engine
            .model
            .outcomes
            .submission_mut(&self.submission)
            .stage_mut(stage_id)
            .remove(outcome_id);
        self.engine.view.set_score(self.score());
    }

    fn remove_feedback(&mut self, stage_id: &str, feedback_id: &str) {
        self.engine
            .model
            .feedback
            .submission_mut(&self.submission)
            .stage_mut(stage_id)
            .remove(feedback_id);
    }

    /// Make the stage after `stage_id` the next one, entering it when
    /// `auto` and progress on success is configured.
    fn advance(&mut self, stage_id: &str, auto: bool) -> Result<(), StageError> {
        let Some(next) = self.engine.stages.next_stage_id(stage_id)?.map(str::to_string) else {
            return Ok(());
        };
        if self.engine.stages.state(&next) != Some(StageState::Inactive) {
            return Ok(());
        }

        self.next_stage_id = Some(next.clone());
        if auto && self.engine.config.assessment.progress_on_success {
            self.execute_stage(&next)?;
        }
        Ok(())
    }

    /// Send interactive input to a stage that has been entered.
    ///
    /// Completion of the input (all required questions answered, or an
    /// edit accepted) reports PASS_NONFINAL for the stage.
    pub fn answer(&mut self, stage_id: &str, input: HandlerInput) -> Result<(), StageError> {
        self.engine.label(stage_id)?;
        match self.engine.stages.state(stage_id) {
            Some(StageState::Active) | Some(StageState::Complete) => {}
            _ => return Err(StageError::NotReady(stage_id.to_string())),
        }
        let active = self
            .engine
            .active
            .get(stage_id)
            .ok_or_else(|| StageError::Ignorable("Stage has not yet executed.".to_string()))?;
        let handler = active.handler.clone();
        let ctx = active.ctx.clone();

        let update = {
            let mut handler = handler
                .try_lock()
                .ok_or_else(|| StageError::Ignorable("Stage is still running.".to_string()))?;
            handler.on_input(&ctx, input)?
        };

        if let Some(outcome_id) = &update.clear_outcome {
            self.remove_outcome(stage_id, outcome_id);
        }
        if let Some(feedback_id) = &update.clear_feedback {
            self.remove_feedback(stage_id, feedback_id);
        }
        if let Some(outcome) = update.outcome {
            self.set_outcome(stage_id, outcome);
        }
        if let Some((feedback_id, text)) = &update.feedback {
            self.add_feedback(stage_id, feedback_id, text);
        }

        let output = match update.output {
            Some(output) => output,
            None => handler.lock().output(),
        };
        self.engine.set_output(stage_id, &output);

        if update.complete {
            self.report(StageResult::pass_nonfinal(), Some(stage_id))?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerEvent) -> Result<(), StageError> {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Some(result) = event.result else {
            tracing::debug!(stage = %event.stage_id, "Worker finished without a result");
            return Ok(());
        };
        if self.engine.stages.state(&event.stage_id) == Some(StageState::Failed) {
            tracing::warn!(stage = %event.stage_id, kind = %result.kind, "Dropping result of failed stage");
            return Ok(());
        }

        match self.report(result, Some(&event.stage_id)) {
            Ok(()) => Ok(()),
            Err(e) if self.engine.config.app.debug => Err(e),
            Err(e) => {
                tracing::error!(stage = %event.stage_id, error = %e, "Failed to fold worker result");
                self.engine.alert("Error", &e.to_string(), false);
                Ok(())
            }
        }
    }

    /// Fold every finished worker result without blocking.
    ///
    /// Returns how many results were handled.
    pub fn pump(&mut self) -> Result<usize, StageError> {
        let mut handled = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(handled),
            }
        }
    }

    /// Block until no worker is running, folding results as they arrive.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_for_workers(&mut self) -> Result<(), StageError> {
        while self.in_flight > 0 {
            match self.events_rx.blocking_recv() {
                Some(event) => self.handle_event(event)?,
                None => break,
            }
        }
        Ok(())
    }
}

impl StageController for Scorer {
    fn execute_first_stage(&mut self) -> Result<(), StageError> {
        self.engine.view.set_score(self.score());
        if self.started {
            return Ok(());
        }
        self.started = true;

        let Some(first) = self.engine.stages.first_stage_id().map(str::to_string) else {
            return Ok(());
        };
        self.next_stage_id = Some(first.clone());
        self.execute_stage(&first)
    }

    fn select_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        let label = self.engine.label(stage_id)?;

        if self.next_stage_id.as_deref() == Some(stage_id) {
            self.engine.view.show_stage(stage_id, &label);
            return self.execute_stage(stage_id);
        }

        match self.refresh_stage(stage_id) {
            Err(e) if !e.is_ignorable() => return Err(e),
            _ => {}
        }
        self.engine.view.show_stage(stage_id, &label);
        Ok(())
    }

    fn execute_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        let label = self.engine.label(stage_id)?;
        if self.next_stage_id.as_deref() != Some(stage_id) {
            return Err(StageError::NotReady(stage_id.to_string()));
        }
        self.next_stage_id = None;

        // Failed, or already entered
        if self.engine.stages.state(stage_id) != Some(StageState::Inactive) {
            return Ok(());
        }

        if let Some(pre) = self.engine.feedback_pre(stage_id) {
            self.add_feedback(stage_id, FEEDBACK_PRE, &pre);
        }

        self.engine.current_stage = Some(stage_id.to_string());
        self.engine.view.show_stage(stage_id, &label);
        tracing::info!(stage = %stage_id, submission = %self.submission, "Entering stage");

        let ctx = self
            .engine
            .context(stage_id, Some(&self.submission), self.score())?;
        let handler = match self.engine.instantiate(&ctx) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(stage = %stage_id, error = %e, "Stage handler failed to start");
                self.report(StageResult::critical(e.to_string()), Some(stage_id))?;
                if self.engine.config.app.debug {
                    return Err(e);
                }
                return Ok(());
            }
        };

        let variant = handler.lock().variant();
        self.engine.active.insert(
            stage_id.to_string(),
            ActiveStage {
                handler: handler.clone(),
                ctx: ctx.clone(),
            },
        );

        match variant {
            HandlerVariant::None => {
                self.engine.set_state(stage_id, StageState::Complete);
                // No result is reported for a no-op stage
                if let Some(post) = self.engine.feedback_post(stage_id) {
                    self.add_feedback(stage_id, FEEDBACK_POST, &post);
                }
                self.advance(stage_id, true)?;
            }
            HandlerVariant::Form => {
                self.engine.set_state(stage_id, StageState::Active);
                let output = handler.lock().output();
                self.engine.set_output(stage_id, &output);
            }
            HandlerVariant::Text
            | HandlerVariant::EditText
            | HandlerVariant::Process
            | HandlerVariant::Custom => {
                self.engine.set_state(stage_id, StageState::Active);
                match spawn_worker(handler, ctx, self.events_tx.clone()) {
                    Ok(_) => {
                        self.in_flight += 1;
                        tracing::debug!(stage = %stage_id, "Worker spawned");
                    }
                    Err(e) => {
                        let message = format!("Failed to start stage worker: {}", e);
                        self.report(StageResult::critical(message), Some(stage_id))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn refresh_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        let active = self
            .engine
            .active
            .get(stage_id)
            .ok_or_else(|| StageError::Ignorable("Stage has not yet executed.".to_string()))?;
        let ctx = active.ctx.clone();

        let output = {
            let mut handler = active
                .handler
                .try_lock()
                .ok_or_else(|| StageError::Ignorable("Stage is still running.".to_string()))?;
            handler.refresh(&ctx)
        };
        self.engine.set_output(stage_id, &output);
        Ok(())
    }

    fn report(&mut self, result: StageResult, stage_id: Option<&str>) -> Result<(), StageError> {
        let stage_id = match stage_id.or(self.engine.current_stage.as_deref()) {
            Some(stage_id) => stage_id.to_string(),
            None => return Err(StageError::Ignorable("No stage is active.".to_string())),
        };
        let label = self.engine.label(&stage_id)?;
        tracing::debug!(stage = %stage_id, kind = %result.kind, "Folding stage result");

        if let Some(outcome) = &result.outcome {
            self.set_outcome(&stage_id, outcome.clone());
        }
        for (feedback_id, text) in &result.feedback {
            self.add_feedback(&stage_id, feedback_id, text);
        }
        if let Some(post) = self.engine.feedback_post(&stage_id) {
            self.add_feedback(&stage_id, FEEDBACK_POST, &post);
        }

        match result.kind {
            ResultKind::Pass | ResultKind::PassNonfinal => {
                self.engine.set_state(&stage_id, StageState::Complete);
                if let Some(output) = &result.output {
                    self.engine.set_output(&stage_id, output);
                }
                self.advance(&stage_id, result.kind == ResultKind::Pass)?;
            }
            ResultKind::Partial => {
                self.engine.set_state(&stage_id, StageState::Complete);
                if let Some(output) = &result.output {
                    self.engine.set_output(&stage_id, output);
                }
            }
            ResultKind::Critical | ResultKind::Error | ResultKind::Fail => {
                let halt = self
                    .engine
                    .stages
                    .descriptor(&stage_id)
                    .is_some_and(|d| d.halt_on_error());
                if halt {
                    self.engine.halt();
                    self.next_stage_id = None;
                }
                self.engine.set_state(&stage_id, StageState::Failed);
                if let Some(output) = &result.output {
                    self.engine.set_output(&stage_id, output);
                }

                let error = result.error_text().unwrap_or_default();
                tracing::warn!(stage = %stage_id, kind = %result.kind, error = %error, halt, "Stage failed");
                self.engine.alert(&label, error, halt);
            }
        }
        Ok(())
    }

    fn engine(&self) -> &Engine {
        &self.engine
    }
}
