//! Stage results.

use super::output::StageOutput;
use crate::model::Outcome;
use serde::{Deserialize, Serialize};

/// How a stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    Critical,
    Error,
    Fail,
    Pass,
    /// Complete but revisitable; never auto-advances
    PassNonfinal,
    /// Complete, informational only; never advances
    Partial,
}

impl ResultKind {
    pub fn is_failure(&self) -> bool {
        matches!(self, ResultKind::Critical | ResultKind::Error | ResultKind::Fail)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultKind::Pass | ResultKind::PassNonfinal)
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResultKind::Critical => "CRITICAL",
            ResultKind::Error => "ERROR",
            ResultKind::Fail => "FAIL",
            ResultKind::Pass => "PASS",
            ResultKind::PassNonfinal => "PASS_NONFINAL",
            ResultKind::Partial => "PARTIAL",
        };
        f.write_str(name)
    }
}

/// The outcome of running a stage, folded into the model by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub kind: ResultKind,
    pub outcome: Option<Outcome>,
    pub output: Option<StageOutput>,

    /// (feedback id, text) fragments to append
    pub feedback: Vec<(String, String)>,

    error: Option<String>,
}

impl StageResult {
    pub fn new(kind: ResultKind) -> Self {
        Self {
            kind,
            outcome: None,
            output: None,
            feedback: Vec::new(),
            error: None,
        }
    }

    pub fn pass() -> Self {
        Self::new(ResultKind::Pass)
    }

    pub fn pass_nonfinal() -> Self {
        Self::new(ResultKind::PassNonfinal)
    }

    pub fn partial() -> Self {
        Self::new(ResultKind::Partial)
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self::new(ResultKind::Fail).with_error(error)
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::new(ResultKind::Error).with_error(error)
    }

    pub fn critical(error: impl Into<String>) -> Self {
        Self::new(ResultKind::Critical).with_error(error)
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_feedback(mut self, feedback_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.feedback.push((feedback_id.into(), text.into()));
        self
    }

    /// Attach error text. Only failing kinds keep it.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        if self.kind.is_failure() {
            self.error = Some(error.into());
        }
        self
    }

    /// Error text, present only for failing kinds.
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_only_kept_for_failures() {
        assert_eq!(StageResult::fail("boom").error_text(), Some("boom"));
        assert_eq!(StageResult::pass().with_error("ignored").error_text(), None);
    }

    #[test]
    fn test_kind_classification() {
        assert!(ResultKind::Critical.is_failure());
        assert!(ResultKind::PassNonfinal.is_success());
        assert!(!ResultKind::Partial.is_success());
        assert!(!ResultKind::Partial.is_failure());
        assert_eq!(ResultKind::PassNonfinal.to_string(), "PASS_NONFINAL");
    }
}
