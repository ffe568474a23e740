//! Answer tracking for one submission's form.

use super::definition::{FormDefinition, Question, QuestionKind};
use super::FormError;
use crate::model::{Bounds, Feedbacks, Outcome, Outcomes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An answer given to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormAnswer {
    /// Choose a scale option by index
    Select(usize),
    /// Deselect a scale question
    Clear,
    /// Raw text typed into a score field
    Score(String),
    /// Free feedback text
    Text(String),
}

/// What an answer changes in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FormUpdate {
    pub outcome: Option<Outcome>,
    /// (feedback id, text)
    pub feedback: Option<(String, String)>,
    /// Outcome to drop from the model
    pub clear_outcome: Option<String>,
    /// Feedback fragment to drop from the model
    pub clear_feedback: Option<String>,
    /// True once no required question is outstanding
    pub complete: bool,
}

/// Tracks which required questions are still unanswered.
#[derive(Debug, Clone, PartialEq)]
pub struct FormProgress {
    definition: FormDefinition,
    required_not_completed: BTreeSet<String>,
}

impl FormProgress {
    /// Start tracking, counting existing answers as complete.
    pub fn new(
        definition: FormDefinition,
        existing: Option<&Outcomes>,
        existing_feedback: Option<&Feedbacks>,
    ) -> Self {
        let mut required_not_completed = BTreeSet::new();
        for question in definition.required() {
            let outcome = existing.and_then(|o| o.get(question.outcome_id()));
            let answered = match &question.kind {
                QuestionKind::Scale { .. } => outcome.is_some_and(|o| o.key.is_some()),
                QuestionKind::InputScore { .. } => outcome.is_some_and(|o| o.value.is_some()),
                QuestionKind::InputFeedback => existing_feedback
                    .and_then(|f| f.get(&question.num))
                    .is_some_and(|text| !text.trim().is_empty()),
            };
            if !answered {
                required_not_completed.insert(question.num.clone());
            }
        }

        Self {
            definition,
            required_not_completed,
        }
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    /// Required questions still unanswered, by number.
    pub fn outstanding(&self) -> impl Iterator<Item = &str> {
        self.required_not_completed.iter().map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.required_not_completed.is_empty()
    }

    fn mark_answered(&mut self, question: &Question, answered: bool) {
        if answered {
            self.required_not_completed.remove(&question.num);
        } else if question.required {
            self.required_not_completed.insert(question.num.clone());
        }
    }

    /// Apply an answer and report the resulting model changes.
    pub fn answer(&mut self, num: &str, answer: FormAnswer) -> Result<FormUpdate, FormError> {
        let question = self
            .definition
            .question(num)
            .cloned()
            .ok_or_else(|| FormError::UnknownQuestion(num.to_string()))?;

        let mut update = FormUpdate {
            outcome: None,
            feedback: None,
            clear_outcome: None,
            clear_feedback: None,
            complete: false,
        };

        match (&question.kind, answer) {
            (QuestionKind::Scale { feedback, .. }, FormAnswer::Select(index)) => {
                let declared = question
                    .declared_outcome()
                    .ok_or_else(|| FormError::UnknownQuestion(num.to_string()))?;
                update.outcome = Some(declared.with_key(index)?);
                if let Some(text) = feedback.as_ref().and_then(|f| f.get(index)) {
                    update.feedback = Some((question.num.clone(), text.clone()));
                }
                self.mark_answered(&question, true);
            }
            (QuestionKind::Scale { feedback, .. }, FormAnswer::Clear) => {
                update.clear_outcome = Some(question.outcome_id().to_string());
                if feedback.is_some() {
                    update.clear_feedback = Some(question.num.clone());
                }
                self.mark_answered(&question, false);
            }
            (QuestionKind::InputScore { min, max }, FormAnswer::Score(raw)) => {
                let value = clamp_input(&raw, *min, *max);
                update.outcome = Some(
                    Outcome::user_input(question.num.clone(), value)
                        .with_explanation(question.text.clone()),
                );
                self.mark_answered(&question, !raw.trim().is_empty());
            }
            (QuestionKind::InputFeedback, FormAnswer::Text(text)) => {
                let answered = !text.trim().is_empty();
                update.feedback = Some((question.num.clone(), text));
                self.mark_answered(&question, answered);
            }
            (_, answer) => {
                return Err(FormError::AnswerMismatch {
                    question: num.to_string(),
                    answer: format!("{:?}", answer),
                })
            }
        }

        update.complete = self.is_complete();
        Ok(update)
    }
}

/// Parse a typed score and clamp it to the question bounds.
///
/// Unparsable input falls back to the minimum, or zero without one.
pub fn clamp_input(raw: &str, min: Option<f64>, max: Option<f64>) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) => Bounds::new(min, max).clamp(value),
        Err(_) => min.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Section;

    fn definition() -> FormDefinition {
        let section = Section::new("stage_b")
            .with("question1", "Quality")
            .with("type1", "scale")
            .with("required1", "true")
            .with("answer1", r#"["Poor", "Okay", "Great"]"#)
            .with("score1", "0, 5, 10")
            .with("feedback1", "Poor work.\nOkay work.\nGreat work.")
            .with("question2", "Bonus")
            .with("type2", "input_score")
            .with("min2", "0")
            .with("max2", "3")
            .with("question3", "Comments")
            .with("type3", "input_feedback");
        FormDefinition::from_section("b", &section).unwrap()
    }

    #[test]
    fn test_required_question_blocks_completion() {
        let mut progress = FormProgress::new(definition(), None, None);
        assert!(!progress.is_complete());
        assert_eq!(progress.outstanding().collect::<Vec<_>>(), vec!["1"]);

        let update = progress.answer("2", FormAnswer::Score("2".into())).unwrap();
        assert!(!update.complete);

        let update = progress.answer("1", FormAnswer::Select(2)).unwrap();
        assert!(update.complete);
        let outcome = update.outcome.unwrap();
        assert_eq!(outcome.value, Some(10.0));
        assert_eq!(outcome.key, Some(2));
        assert_eq!(
            update.feedback,
            Some(("1".to_string(), "Great work.".to_string()))
        );
    }

    #[test]
    fn test_clear_restores_required() {
        let mut progress = FormProgress::new(definition(), None, None);
        progress.answer("1", FormAnswer::Select(0)).unwrap();
        assert!(progress.is_complete());
        let update = progress.answer("1", FormAnswer::Clear).unwrap();
        assert!(!update.complete);
        assert!(update.outcome.is_none());
        assert_eq!(update.clear_outcome.as_deref(), Some("1"));
        assert_eq!(update.clear_feedback.as_deref(), Some("1"));
    }

    #[test]
    fn test_select_out_of_range_fails() {
        let mut progress = FormProgress::new(definition(), None, None);
        assert!(matches!(
            progress.answer("1", FormAnswer::Select(7)),
            Err(FormError::Model(_))
        ));
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_input_score_is_clamped() {
        let mut progress = FormProgress::new(definition(), None, None);
        let update = progress.answer("2", FormAnswer::Score("9".into())).unwrap();
        let outcome = update.outcome.unwrap();
        assert_eq!(outcome.value, Some(3.0));
        assert!(outcome.user_input);

        let update = progress.answer("2", FormAnswer::Score("abc".into())).unwrap();
        assert_eq!(update.outcome.unwrap().value, Some(0.0));
    }

    #[test]
    fn test_clamp_input_without_bounds() {
        assert_eq!(clamp_input("-4.5", None, None), -4.5);
        assert_eq!(clamp_input("", None, None), 0.0);
        assert_eq!(clamp_input("x", Some(1.0), None), 1.0);
    }

    #[test]
    fn test_clamp_input_min_wins_over_max() {
        assert_eq!(clamp_input("5", Some(3.0), Some(1.0)), 3.0);
        assert_eq!(clamp_input("0", Some(3.0), Some(1.0)), 3.0);
        assert_eq!(clamp_input("7", Some(0.0), Some(5.0)), 5.0);
        assert_eq!(clamp_input("-2", Some(0.0), Some(5.0)), 0.0);
    }

    #[test]
    fn test_answer_kind_mismatch() {
        let mut progress = FormProgress::new(definition(), None, None);
        assert!(matches!(
            progress.answer("3", FormAnswer::Select(0)),
            Err(FormError::AnswerMismatch { .. })
        ));
        assert!(matches!(
            progress.answer("9", FormAnswer::Clear),
            Err(FormError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_existing_answers_count_as_complete() {
        let mut existing = Outcomes::new();
        let declared = definition().question("1").unwrap().declared_outcome().unwrap();
        existing.set("1", declared.with_key(1).unwrap());
        let progress = FormProgress::new(definition(), Some(&existing), None);
        assert!(progress.is_complete());
    }
}
