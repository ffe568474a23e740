//! Stage controllers.
//!
//! - [`Scorer`]: runs the pipeline for one submission, in order
//! - [`Marker`]: opens any stage across all submissions to assign marks
//! - [`Deleter`]: drops a submission's stored results
//!
//! Scorer and marker share an [`Engine`] holding the configuration, the
//! stage registry, the model and the view. All model mutation happens on
//! the thread that owns the controller.

mod deleter;
mod marker;
mod scorer;

pub use deleter::Deleter;
pub use marker::Marker;
pub use scorer::Scorer;

use crate::worker::SharedHandler;
use feedbacker_core::{
    Alert, BoundsTable, Config, HandlerRegistry, Model, StageContext, StageError, StageOutput,
    StageRegistry, StageResult, StageState, View,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Operations common to every stage-driving controller.
pub trait StageController {
    /// Enter the first stage. Calling it again does nothing.
    fn execute_first_stage(&mut self) -> Result<(), StageError>;

    /// The front end picked a stage.
    fn select_stage(&mut self, stage_id: &str) -> Result<(), StageError>;

    /// Enter a stage if it may run.
    fn execute_stage(&mut self, stage_id: &str) -> Result<(), StageError>;

    /// Re-publish a stage's output without side effects.
    ///
    /// Fails with [`StageError::Ignorable`] for a stage never entered.
    fn refresh_stage(&mut self, stage_id: &str) -> Result<(), StageError>;

    /// Fold a result into the model; defaults to the current stage.
    fn report(&mut self, result: StageResult, stage_id: Option<&str>) -> Result<(), StageError>;

    fn engine(&self) -> &Engine;

    fn model(&self) -> &Model {
        &self.engine().model
    }

    fn stage_state(&self, stage_id: &str) -> Option<StageState> {
        self.engine().stages.state(stage_id)
    }
}

/// A handler created for one stage entry, with the context it was built from.
pub(crate) struct ActiveStage {
    pub handler: SharedHandler,
    pub ctx: StageContext,
}

/// State shared by the scorer and marker.
pub struct Engine {
    pub(crate) config: Arc<Config>,
    pub(crate) stages: StageRegistry,
    pub(crate) model: Model,
    pub(crate) view: Box<dyn View>,
    pub(crate) score_bounds: BoundsTable,
    pub(crate) mark_bounds: BoundsTable,
    pub(crate) current_stage: Option<String>,
    pub(crate) active: HashMap<String, ActiveStage>,
}

impl Engine {
    /// Build the stage registry and announce every stage to the view.
    pub fn new(
        config: Arc<Config>,
        handlers: &HandlerRegistry,
        model: Model,
        mut view: Box<dyn View>,
    ) -> Result<Self, StageError> {
        let stages = StageRegistry::build(&config, handlers)?;
        for descriptor in stages.iter() {
            view.append_stage(descriptor);
        }

        Ok(Self {
            score_bounds: config.score_bounds(),
            mark_bounds: config.mark_bounds(),
            config,
            stages,
            model,
            view,
            current_stage: None,
            active: HashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn score_bounds(&self) -> &BoundsTable {
        &self.score_bounds
    }

    pub fn mark_bounds(&self) -> &BoundsTable {
        &self.mark_bounds
    }

    pub(crate) fn label(&self, stage_id: &str) -> Result<String, StageError> {
        self.stages
            .descriptor(stage_id)
            .map(|d| d.label.clone())
            .ok_or_else(|| StageError::InvalidStage(stage_id.to_string()))
    }

    pub(crate) fn set_state(&mut self, stage_id: &str, state: StageState) {
        if self.stages.set_state(stage_id, state) {
            tracing::debug!(stage = %stage_id, state = %state, "Stage state changed");
            self.view.set_stage_state(stage_id, state);
        }
    }

    pub(crate) fn set_output(&mut self, stage_id: &str, output: &StageOutput) {
        self.view.set_stage_output(stage_id, output);
    }

    /// Fail every stage after a halting failure.
    pub(crate) fn halt(&mut self) {
        let stage_ids: Vec<String> = self.stages.stage_ids().map(str::to_string).collect();
        tracing::warn!(stages = stage_ids.len(), "Halting all stages");
        for stage_id in stage_ids {
            self.set_state(&stage_id, StageState::Failed);
        }
    }

    pub(crate) fn alert(&mut self, title: &str, text: &str, halt: bool) {
        let alert = Alert::new(title, text, halt, &self.config.app.name);
        self.view.show_alert(&alert);
    }

    /// A context for one entry into `stage_id`.
    pub(crate) fn context(
        &self,
        stage_id: &str,
        submission: Option<&str>,
        score: f64,
    ) -> Result<StageContext, StageError> {
        let descriptor = self
            .stages
            .descriptor(stage_id)
            .ok_or_else(|| StageError::InvalidStage(stage_id.to_string()))?;

        let mut ctx = StageContext::new(descriptor.config.clone()).with_dirs(
            self.config.app.dir_temp.clone(),
            self.config.app.dir_submissions.clone(),
        );
        ctx.score = score;

        if let Some(submission) = submission {
            ctx = ctx.with_submission(submission);
            if let Some(outcomes) = self
                .model
                .outcomes
                .submission(submission)
                .and_then(|s| s.stage(stage_id))
            {
                ctx.existing_outcomes = outcomes.clone();
            }
            if let Some(feedback) = self
                .model
                .feedback
                .submission(submission)
                .and_then(|s| s.stage(stage_id))
            {
                ctx.existing_feedback = feedback.clone();
            }
        }
        Ok(ctx)
    }

    /// Create a handler and let it declare its outcomes.
    pub(crate) fn instantiate(&self, ctx: &StageContext) -> Result<SharedHandler, StageError> {
        let descriptor = self
            .stages
            .descriptor(&ctx.stage_id)
            .ok_or_else(|| StageError::InvalidStage(ctx.stage_id.clone()))?;

        let mut handler = descriptor.instantiate(ctx).map_err(construction_error)?;
        handler.calculate_outcomes(ctx).map_err(construction_error)?;
        Ok(Arc::new(Mutex::new(handler)))
    }

    pub(crate) fn feedback_pre(&self, stage_id: &str) -> Option<String> {
        self.stages
            .descriptor(stage_id)
            .and_then(|d| d.feedback_pre())
            .map(str::to_string)
    }

    /// The stage's `feedback_post`, unless blank.
    pub(crate) fn feedback_post(&self, stage_id: &str) -> Option<String> {
        self.stages
            .descriptor(stage_id)
            .and_then(|d| d.feedback_post())
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    }
}

fn construction_error(error: StageError) -> StageError {
    match error {
        StageError::HandlerConstruction(_) => error,
        other => StageError::HandlerConstruction(other.to_string()),
    }
}
