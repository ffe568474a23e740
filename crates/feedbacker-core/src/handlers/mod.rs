//! The handler contract: pluggable logic driving one stage.
//!
//! Handlers are built by a [`HandlerFactory`] registered under a type name.
//! The controller dispatches on [`Handler::variant`]:
//! - `None`: instant pass, never run
//! - `Form`: publishes its questions; completion arrives through input
//! - everything else: `run()` on a background worker

mod factory;
mod form;
mod none;
mod process;
mod selective;
mod submission;
mod text;

pub use factory::{HandlerFactory, HandlerRegistry};
pub use form::{FormHandler, FormHandlerFactory};
pub use none::{NoneHandler, NoneHandlerFactory};
pub use process::{
    ExitCodeResponder, ProcessHandler, ProcessHandlerFactory, ProcessOutput, ProcessResponder,
    RunPolicy,
};
pub use selective::{SelectiveFeedbackHandler, SelectiveFeedbackHandlerFactory, SELECTIVE_FIELD};
pub use submission::{SubmissionCheckHandler, SubmissionCheckHandlerFactory, SUBMISSION_OUTCOME};
pub use text::{EditTextHandlerFactory, TextHandler, TextHandlerFactory, TEXT_FIELD};

use crate::config::StageConfig;
use crate::form::FormAnswer;
use crate::model::{Feedbacks, Outcome, Outcomes};
use crate::stage::{StageError, StageOutput, StageResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Closed set of handler kinds the controller dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerVariant {
    None,
    Text,
    EditText,
    Form,
    Process,
    /// Arbitrary logic in `run()`
    Custom,
}

/// Read-only inputs handed to a handler by the controller.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub stage_id: String,

    /// Absent in marking mode, which spans all submissions
    pub submission: Option<String>,

    pub dir_temp: PathBuf,
    pub dir_submissions: PathBuf,
    pub config: Arc<StageConfig>,

    /// Submission score when the stage was entered
    pub score: f64,

    /// Stored outcomes of this stage for the submission
    pub existing_outcomes: Outcomes,

    /// Stored feedback of this stage for the submission
    pub existing_feedback: Feedbacks,
}

impl StageContext {
    pub fn new(config: Arc<StageConfig>) -> Self {
        Self {
            stage_id: config.stage_id.clone(),
            submission: None,
            dir_temp: std::env::temp_dir(),
            dir_submissions: PathBuf::from("."),
            config,
            score: 0.0,
            existing_outcomes: Outcomes::new(),
            existing_feedback: Feedbacks::new(),
        }
    }

    pub fn with_submission(mut self, submission: impl Into<String>) -> Self {
        self.submission = Some(submission.into());
        self
    }

    pub fn with_dirs(mut self, dir_temp: PathBuf, dir_submissions: PathBuf) -> Self {
        self.dir_temp = dir_temp;
        self.dir_submissions = dir_submissions;
        self
    }

    /// `<dir_submissions>/<submission>`, when scoring a submission.
    pub fn submission_dir(&self) -> Option<PathBuf> {
        self.submission
            .as_ref()
            .map(|submission| self.dir_submissions.join(submission))
    }
}

/// Interactive input from the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerInput {
    /// An answer to a numbered form question
    Form { question: String, answer: FormAnswer },
    /// New text for an editable field
    Text { field_id: String, text: String },
}

/// Model changes caused by an input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputUpdate {
    pub outcome: Option<Outcome>,
    /// (feedback id, text)
    pub feedback: Option<(String, String)>,
    pub clear_outcome: Option<String>,
    pub clear_feedback: Option<String>,
    /// True if the stage may now report completion
    pub complete: bool,
    pub output: Option<StageOutput>,
}

/// Logic for one stage of one run.
///
/// `calculate_outcomes` is always called before `run` or `refresh`.
pub trait Handler: Send {
    fn variant(&self) -> HandlerVariant;

    /// Declare every outcome this stage can produce.
    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError>;

    /// Outcomes declared by `calculate_outcomes`.
    fn outcomes(&self) -> &Outcomes;

    /// Current display payload.
    fn output(&self) -> StageOutput {
        StageOutput::None
    }

    /// Execute the stage. `None` means not finished.
    fn run(&mut self, ctx: &StageContext) -> Option<StageResult>;

    /// Re-derive display state without side effects.
    fn refresh(&mut self, _ctx: &StageContext) -> StageOutput {
        self.output()
    }

    /// Handle interactive input.
    fn on_input(
        &mut self,
        ctx: &StageContext,
        _input: HandlerInput,
    ) -> Result<InputUpdate, StageError> {
        Err(StageError::NotInteractive(ctx.stage_id.clone()))
    }
}
