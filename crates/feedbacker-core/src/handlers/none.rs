//! A stage that does nothing and passes instantly.

use super::{Handler, HandlerFactory, HandlerVariant, StageContext};
use crate::model::Outcomes;
use crate::stage::{StageError, StageResult};

#[derive(Debug, Default)]
pub struct NoneHandler {
    outcomes: Outcomes,
}

impl Handler for NoneHandler {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::None
    }

    fn calculate_outcomes(&mut self, _ctx: &StageContext) -> Result<(), StageError> {
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn run(&mut self, _ctx: &StageContext) -> Option<StageResult> {
        Some(StageResult::pass())
    }
}

pub struct NoneHandlerFactory;

impl HandlerFactory for NoneHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "none"
    }

    fn create(&self, _ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(NoneHandler::default()))
    }

    fn description(&self) -> &'static str {
        "Does nothing; passes immediately"
    }
}
