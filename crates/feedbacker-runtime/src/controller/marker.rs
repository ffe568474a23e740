//! Assigning marks across all submissions.
//!
//! Marker stages are independent views: any configured stage can be
//! opened, in any order, as often as wanted. Opening one seeds a mark for
//! every declared outcome that has none and publishes a summary of how
//! the submissions answered.

use super::{ActiveStage, Engine, StageController};
use feedbacker_core::stage::MarkerSummary;
use feedbacker_core::{
    Config, HandlerRegistry, Model, ModelError, Outcome, ResultKind, StageError, StageOutput,
    StageResult, StageState, View,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Marker {
    engine: Engine,
    started: bool,

    /// Outcomes declared by each opened stage
    declared: HashMap<String, Vec<Outcome>>,
}

impl Marker {
    pub fn new(
        config: Arc<Config>,
        handlers: &HandlerRegistry,
        model: Model,
        view: Box<dyn View>,
    ) -> Result<Self, StageError> {
        Ok(Self {
            engine: Engine::new(config, handlers, model, view)?,
            started: false,
            declared: HashMap::new(),
        })
    }

    pub fn into_model(self) -> Model {
        self.engine.into_model()
    }

    /// Open every selectable stage once, seeding all marks.
    pub fn open_all(&mut self) -> Result<(), StageError> {
        let stage_ids: Vec<String> = self
            .engine
            .stages
            .iter()
            .filter(|d| d.selectable())
            .map(|d| d.stage_id.clone())
            .collect();
        for stage_id in stage_ids {
            self.execute_stage(&stage_id)?;
        }
        Ok(())
    }

    /// Set the mark of an outcome, or of one scale key when `key` is given.
    pub fn set_mark(
        &mut self,
        stage_id: &str,
        outcome_id: &str,
        key: Option<usize>,
        mark: f64,
    ) -> Result<(), StageError> {
        self.engine.label(stage_id)?;
        let declared_scale = self
            .declared
            .get(stage_id)
            .and_then(|outcomes| outcomes.iter().find(|o| o.outcome_id == outcome_id))
            .is_some_and(Outcome::is_scale);
        let marks = self.engine.model.marks.stage_mut(stage_id);
        match key {
            Some(key) => marks.set_key(outcome_id, key, mark),
            None if declared_scale => {
                return Err(ModelError::KeyRequired(outcome_id.to_string()).into())
            }
            None => marks.set_single(outcome_id, mark)?,
        }
        tracing::debug!(stage = %stage_id, outcome = %outcome_id, ?key, mark, "Mark set");

        if self.declared.contains_key(stage_id) {
            self.publish_summary(stage_id);
        }
        Ok(())
    }

    /// Clamped mark of every submission.
    pub fn submission_marks(&self) -> Vec<(String, f64)> {
        self.engine
            .model
            .outcomes
            .iter()
            .map(|(submission, stages)| {
                let mark = stages.mark(&self.engine.model.marks, &self.engine.mark_bounds);
                (submission.to_string(), mark)
            })
            .collect()
    }

    /// Summary of one opened stage.
    pub fn summary(&self, stage_id: &str) -> Option<MarkerSummary> {
        let declared = self.declared.get(stage_id)?;
        Some(MarkerSummary::build(
            stage_id,
            declared,
            &self.engine.model.outcomes,
            self.engine.model.marks.stage(stage_id),
        ))
    }

    fn publish_summary(&mut self, stage_id: &str) {
        if let Some(summary) = self.summary(stage_id) {
            self.engine
                .set_output(stage_id, &StageOutput::Marker { summary });
        }
    }
}

impl StageController for Marker {
    fn execute_first_stage(&mut self) -> Result<(), StageError> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        match self.engine.stages.first_stage_id().map(str::to_string) {
            Some(first) => self.execute_stage(&first),
            None => Ok(()),
        }
    }

    fn select_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        let label = self.engine.label(stage_id)?;
        self.engine.view.show_stage(stage_id, &label);
        self.execute_stage(stage_id)
    }

    fn execute_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        let label = self.engine.label(stage_id)?;
        if self.engine.stages.state(stage_id) == Some(StageState::Failed) {
            return Ok(());
        }

        self.engine.current_stage = Some(stage_id.to_string());
        self.engine.view.show_stage(stage_id, &label);

        let ctx = self.engine.context(stage_id, None, 0.0)?;
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

        let declared: Vec<Outcome> = handler
            .lock()
            .outcomes()
            .iter()
            .map(|(_, outcome)| outcome.clone())
            .collect();

        let marks = self.engine.model.marks.stage_mut(stage_id);
        let seeded = declared.iter().filter(|outcome| marks.seed(outcome)).count();
        tracing::debug!(stage = %stage_id, outcomes = declared.len(), seeded, "Marks seeded");

        self.engine
            .active
            .insert(stage_id.to_string(), ActiveStage { handler, ctx });
        self.declared.insert(stage_id.to_string(), declared);

        self.report(StageResult::partial(), Some(stage_id))
    }

    fn refresh_stage(&mut self, stage_id: &str) -> Result<(), StageError> {
        if !self.declared.contains_key(stage_id) {
            return Err(StageError::Ignorable("Stage has not yet executed.".to_string()));
        }
        self.publish_summary(stage_id);
        Ok(())
    }

    fn report(&mut self, result: StageResult, stage_id: Option<&str>) -> Result<(), StageError> {
        let stage_id = match stage_id.or(self.engine.current_stage.as_deref()) {
            Some(stage_id) => stage_id.to_string(),
            None => return Err(StageError::Ignorable("No stage is active.".to_string())),
        };
        let label = self.engine.label(&stage_id)?;

        match result.kind {
            ResultKind::Pass | ResultKind::PassNonfinal | ResultKind::Partial => {
                self.engine.set_state(&stage_id, StageState::Complete);
                match &result.output {
                    Some(output) => self.engine.set_output(&stage_id, output),
                    None => self.publish_summary(&stage_id),
                }
            }
            ResultKind::Critical | ResultKind::Error | ResultKind::Fail => {
                let halt = self
                    .engine
                    .stages
                    .descriptor(&stage_id)
                    .is_some_and(|d| d.halt_on_error());
                self.engine.set_state(&stage_id, StageState::Failed);
                let error = result.error_text().unwrap_or_default();
                tracing::warn!(stage = %stage_id, kind = %result.kind, error = %error, "Stage failed");
                self.engine.alert(&label, error, halt);
            }
        }
        Ok(())
    }

    fn engine(&self) -> &Engine {
        &self.engine
    }
}
