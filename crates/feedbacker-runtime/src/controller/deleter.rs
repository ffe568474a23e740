//! Removing a submission's stored results.

use feedbacker_core::Model;

pub struct Deleter {
    model: Model,
}

impl Deleter {
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    /// Drop the submission's feedback and outcomes.
    ///
    /// Returns true if anything was removed and the model needs saving.
    pub fn delete(&mut self, submission: &str) -> bool {
        let feedback = self.model.feedback.remove(submission).is_some();
        if !feedback {
            tracing::warn!(submission = %submission, "No feedback for submission");
        }

        let outcomes = self.model.outcomes.remove(submission).is_some();
        if !outcomes {
            tracing::warn!(submission = %submission, "No outcomes for submission");
        }

        let deleted = feedback || outcomes;
        if deleted {
            tracing::info!(submission = %submission, "Submission deleted");
        }
        deleted
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }
}
