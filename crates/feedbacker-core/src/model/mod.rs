//! Scoring, feedback and marking data model.
//!
//! Containers are get-or-create by key: asking for a submission or stage
//! that has never been seen creates it empty. Absence is never an error at
//! these levels.

pub mod bounds;
mod feedback;
mod marks;
mod ordered;
mod outcome;
mod outcomes;

pub use bounds::{Bounds, BoundsTable};
pub use feedback::{
    join_fragments, unescape, AllFeedback, FeedbackByStage, Feedbacks, FEEDBACK_POST,
    FEEDBACK_PRE,
};
pub use marks::{resolve as resolve_mark, AllMarks, Mark, StageMarks};
pub use outcome::{Outcome, ScaleOption};
pub use outcomes::{AllOutcomes, Outcomes, OutcomesByStage};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by model invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Scale key {key} out of range for outcome '{outcome_id}' ({len} options)")]
    KeyOutOfRange {
        outcome_id: String,
        key: usize,
        len: usize,
    },

    #[error("Outcome '{0}' is not scale based")]
    NotScale(String),

    #[error("Outcome '{0}' value does not match its selected scale option")]
    ScaleMismatch(String),

    #[error("Outcome '{0}' is scale based; its marks are set per key")]
    KeyRequired(String),
}

/// The whole in-memory model: outcomes, feedback and marks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub outcomes: AllOutcomes,

    #[serde(default)]
    pub feedback: AllFeedback,

    #[serde(default)]
    pub marks: AllMarks,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the submission has any stored outcome or feedback.
    pub fn has_submission(&self, submission: &str) -> bool {
        let outcomes = self
            .outcomes
            .submission(submission)
            .is_some_and(|s| !s.is_empty());
        let feedback = self
            .feedback
            .submission(submission)
            .is_some_and(|s| !s.is_empty());
        outcomes || feedback
    }

    /// Drop every outcome and feedback of a submission.
    ///
    /// Returns true if anything was removed. Marks are shared across
    /// submissions and stay.
    pub fn remove_submission(&mut self, submission: &str) -> bool {
        let outcomes = self.outcomes.remove(submission).is_some();
        let feedback = self.feedback.remove(submission).is_some();
        outcomes || feedback
    }

    /// Score of one submission.
    pub fn score(&self, submission: &str, bounds: &BoundsTable) -> f64 {
        match self.outcomes.submission(submission) {
            Some(stages) => stages.score(bounds),
            None => bounds.overall.clamp(0.0),
        }
    }

    /// Mark of one submission.
    pub fn mark(&self, submission: &str, bounds: &BoundsTable) -> f64 {
        match self.outcomes.submission(submission) {
            Some(stages) => stages.mark(&self.marks, bounds),
            None => bounds.overall.clamp(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_submission_keeps_marks() {
        let mut model = Model::new();
        model
            .outcomes
            .submission_mut("s1")
            .stage_mut("a")
            .set("x", Outcome::fixed("x", 1.0));
        model.feedback.submission_mut("s1").stage_mut("a").set("x", "Fine");
        model.marks.stage_mut("a").set_single("x", 1.0).unwrap();

        assert!(model.has_submission("s1"));
        assert!(model.remove_submission("s1"));
        assert!(!model.has_submission("s1"));
        assert!(!model.remove_submission("s1"));
        assert!(model.marks.stage("a").is_some());
    }

    #[test]
    fn test_marker_scenario_per_key_mark() {
        let options = vec![ScaleOption::new("A", 0.0), ScaleOption::new("B", 7.0)];
        let mut model = Model::new();
        model
            .outcomes
            .submission_mut("s1")
            .stage_mut("quality")
            .set("1", Outcome::scale("1", options).with_key(1).unwrap());

        let marks = model.marks.stage_mut("quality");
        marks.set_key("1", 0, 1.0);
        marks.set_key("1", 1, 3.0);

        let bounds = BoundsTable::default();
        assert_eq!(model.mark("s1", &bounds), 3.0);
        assert_eq!(model.score("s1", &bounds), 7.0);
    }
}
