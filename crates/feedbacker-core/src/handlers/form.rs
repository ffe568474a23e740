//! Interactive form stages.
//!
//! A form never finishes from `run()`. The front end sends answers as
//! [`HandlerInput::Form`]; once no required question is outstanding the
//! update is marked complete and the controller reports PASS_NONFINAL.

use super::{Handler, HandlerFactory, HandlerInput, HandlerVariant, InputUpdate, StageContext};
use crate::config::Section;
use crate::form::{FormDefinition, FormProgress};
use crate::model::Outcomes;
use crate::stage::{StageError, StageOutput, StageResult};

#[derive(Debug)]
pub struct FormHandler {
    progress: FormProgress,
    outcomes: Outcomes,
}

impl FormHandler {
    pub fn new(definition: FormDefinition) -> Self {
        Self {
            progress: FormProgress::new(definition, None, None),
            outcomes: Outcomes::new(),
        }
    }

    pub fn progress(&self) -> &FormProgress {
        &self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }
}

impl Handler for FormHandler {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::Form
    }

    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        // Restore answers already stored for this submission
        self.progress = FormProgress::new(
            self.progress.definition().clone(),
            Some(&ctx.existing_outcomes),
            Some(&ctx.existing_feedback),
        );

        self.outcomes = Outcomes::new();
        for outcome in self.progress.definition().declared_outcomes() {
            let outcome_id = outcome.outcome_id.clone();
            self.outcomes.set(&outcome_id, outcome);
        }
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn output(&self) -> StageOutput {
        StageOutput::Form {
            form: self.progress.definition().clone(),
            outstanding: self.progress.outstanding().map(str::to_string).collect(),
        }
    }

    fn run(&mut self, _ctx: &StageContext) -> Option<StageResult> {
        None
    }

    fn on_input(
        &mut self,
        ctx: &StageContext,
        input: HandlerInput,
    ) -> Result<InputUpdate, StageError> {
        let HandlerInput::Form { question, answer } = input else {
            return Err(StageError::NotInteractive(ctx.stage_id.clone()));
        };

        let update = self.progress.answer(&question, answer)?;
        Ok(InputUpdate {
            outcome: update.outcome,
            feedback: update.feedback,
            clear_outcome: update.clear_outcome,
            clear_feedback: update.clear_feedback,
            complete: update.complete,
            output: Some(self.output()),
        })
    }
}

pub struct FormHandlerFactory;

impl HandlerFactory for FormHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "form"
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        let definition = FormDefinition::from_section(&ctx.stage_id, &ctx.config.section)?;
        Ok(Box::new(FormHandler::new(definition)))
    }

    fn validate_config(&self, section: &Section) -> Result<(), StageError> {
        let stage_id = section.name().trim_start_matches("stage_");
        FormDefinition::from_section(stage_id, section)?;
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Interactive form of scale, score and feedback questions"
    }
}
