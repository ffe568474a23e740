//! Test doubles shared by the controller tests.

use feedbacker_core::handlers::HandlerVariant;
use feedbacker_core::stage::StageDescriptor;
use feedbacker_core::{
    Alert, Handler, HandlerFactory, HandlerRegistry, Outcome, Outcomes, StageContext, StageError,
    StageOutput, StageResult, StageState, View,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Append(String),
    Show(String),
    State(String, StageState),
    Output(String, StageOutput),
    Alert(Alert),
    Score(f64),
}

/// A view that records every call; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(alert) => Some(alert),
                _ => None,
            })
            .collect()
    }

    pub fn last_score(&self) -> Option<f64> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Score(score) => Some(score),
            _ => None,
        })
    }

    pub fn last_output(&self, stage_id: &str) -> Option<StageOutput> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Output(id, output) if id == stage_id => Some(output),
            _ => None,
        })
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().push(event);
    }
}

impl View for RecordingView {
    fn append_stage(&mut self, descriptor: &StageDescriptor) {
        self.push(ViewEvent::Append(descriptor.stage_id.clone()));
    }

    fn show_stage(&mut self, stage_id: &str, _label: &str) {
        self.push(ViewEvent::Show(stage_id.to_string()));
    }

    fn set_stage_state(&mut self, stage_id: &str, state: StageState) {
        self.push(ViewEvent::State(stage_id.to_string(), state));
    }

    fn set_stage_output(&mut self, stage_id: &str, output: &StageOutput) {
        self.push(ViewEvent::Output(stage_id.to_string(), output.clone()));
    }

    fn show_alert(&mut self, alert: &Alert) {
        self.push(ViewEvent::Alert(alert.clone()));
    }

    fn set_score(&mut self, score: f64) {
        self.push(ViewEvent::Score(score));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Behaviour {
    Pass,
    Fail,
    Panic,
    Unbuildable,
}

/// Worker-run handler with a canned result.
pub struct Fixed {
    behaviour: Behaviour,
    outcomes: Outcomes,
}

impl Fixed {
    /// Register `fixed_pass`, `fixed_fail`, `fixed_panic` and `fixed_unbuildable`.
    pub fn register_all(registry: &mut HandlerRegistry) {
        for (name, behaviour) in [
            ("fixed_pass", Behaviour::Pass),
            ("fixed_fail", Behaviour::Fail),
            ("fixed_panic", Behaviour::Panic),
            ("fixed_unbuildable", Behaviour::Unbuildable),
        ] {
            registry.register(Arc::new(FixedFactory { name, behaviour }));
        }
    }
}

impl Handler for Fixed {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::Custom
    }

    fn calculate_outcomes(&mut self, _ctx: &StageContext) -> Result<(), StageError> {
        self.outcomes = Outcomes::new();
        self.outcomes.set("points", Outcome::fixed("points", 2.0));
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn run(&mut self, _ctx: &StageContext) -> Option<StageResult> {
        match self.behaviour {
            Behaviour::Pass => Some(StageResult::pass().with_outcome(Outcome::fixed("points", 2.0))),
            Behaviour::Fail => Some(StageResult::fail("tests broke")),
            Behaviour::Panic => panic!("handler exploded"),
            Behaviour::Unbuildable => None,
        }
    }
}

struct FixedFactory {
    name: &'static str,
    behaviour: Behaviour,
}

impl HandlerFactory for FixedFactory {
    fn handler_type(&self) -> &'static str {
        self.name
    }

    fn create(&self, _ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        if self.behaviour == Behaviour::Unbuildable {
            return Err(StageError::HandlerConstruction(
                "fixture refused to build".to_string(),
            ));
        }
        Ok(Box::new(Fixed {
            behaviour: self.behaviour,
            outcomes: Outcomes::new(),
        }))
    }
}
