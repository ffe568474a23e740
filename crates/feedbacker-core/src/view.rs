//! The rendering collaborator.
//!
//! Controllers publish stage state, display payloads and alerts through
//! [`View`]. Front ends implement it; the core never renders anything.

use crate::stage::{StageDescriptor, StageOutput, StageState};
use serde::{Deserialize, Serialize};

/// A button offered by an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AlertAction {
    /// Dismiss and continue the session
    Ok,
    /// Abandon the session
    Quit { label: String },
}

/// A user-visible failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub text: String,

    /// True when the whole pipeline halted and the session must end
    pub halt: bool,

    pub actions: Vec<AlertAction>,
}

impl Alert {
    /// An alert offering only a quit action when `halt`, otherwise only OK.
    pub fn new(title: impl Into<String>, text: impl Into<String>, halt: bool, app_name: &str) -> Self {
        let actions = if halt {
            vec![AlertAction::Quit {
                label: format!("Quit {}", app_name),
            }]
        } else {
            vec![AlertAction::Ok]
        };
        Self {
            title: title.into(),
            text: text.into(),
            halt,
            actions,
        }
    }

    pub fn is_dismissable(&self) -> bool {
        self.actions.contains(&AlertAction::Ok)
    }
}

/// Everything a controller tells the front end.
pub trait View: Send {
    /// Called once per stage, in order, when a controller starts.
    fn append_stage(&mut self, descriptor: &StageDescriptor);

    fn show_stage(&mut self, stage_id: &str, label: &str);

    fn set_stage_state(&mut self, stage_id: &str, state: StageState);

    fn set_stage_output(&mut self, stage_id: &str, output: &StageOutput);

    fn show_alert(&mut self, alert: &Alert);

    /// Running total, for front ends that display one.
    fn set_score(&mut self, _score: f64) {}
}

/// A view that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl View for NullView {
    fn append_stage(&mut self, _descriptor: &StageDescriptor) {}

    fn show_stage(&mut self, _stage_id: &str, _label: &str) {}

    fn set_stage_state(&mut self, _stage_id: &str, _state: StageState) {}

    fn set_stage_output(&mut self, _stage_id: &str, _output: &StageOutput) {}

    fn show_alert(&mut self, _alert: &Alert) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halting_alert_offers_only_quit() {
        let alert = Alert::new("Tests", "boom", true, "feedbacker");
        assert_eq!(
            alert.actions,
            vec![AlertAction::Quit {
                label: "Quit feedbacker".to_string()
            }]
        );
        assert!(!alert.is_dismissable());
    }

    #[test]
    fn test_plain_alert_is_dismissable() {
        let alert = Alert::new("Tests", "boom", false, "feedbacker");
        assert_eq!(alert.actions, vec![AlertAction::Ok]);
        assert!(alert.is_dismissable());
    }
}
