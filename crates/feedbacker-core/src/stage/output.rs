//! Display payloads published to the view.

use crate::form::FormDefinition;
use crate::model::{AllOutcomes, Outcome, ScaleOption, StageMarks};
use serde::{Deserialize, Serialize};

/// One checklist line; `state` is `None` while undecided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub state: Option<bool>,
    pub label: String,
}

impl ChecklistItem {
    pub fn pending(label: impl Into<String>) -> Self {
        Self {
            state: None,
            label: label.into(),
        }
    }
}

/// What a stage shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageOutput {
    None,
    Text {
        text: String,
    },
    /// Edits are sent back keyed by (stage id, field id)
    EditText {
        field_id: String,
        text: String,
        skip_empty: bool,
    },
    Form {
        form: FormDefinition,
        outstanding: Vec<String>,
    },
    Checklist {
        items: Vec<ChecklistItem>,
    },
    Marker {
        summary: MarkerSummary,
    },
}

/// How one declared outcome was answered across submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeSummary {
    Scale {
        outcome_id: String,
        explanation: Option<String>,
        options: Vec<ScaleOption>,
        /// Submissions that chose each option
        counts: Vec<usize>,
        /// Current mark per option
        marks: Vec<Option<f64>>,
    },
    Single {
        outcome_id: String,
        explanation: Option<String>,
        user_input: bool,
        /// Submissions with a value
        count: usize,
        mean: Option<f64>,
        mark: Option<f64>,
    },
}

/// Per-outcome performance histogram of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSummary {
    pub stage_id: String,
    pub submissions: usize,
    pub outcomes: Vec<OutcomeSummary>,
}

impl MarkerSummary {
    /// Summarise every declared outcome of a stage over all submissions.
    pub fn build(
        stage_id: &str,
        declared: &[Outcome],
        all: &AllOutcomes,
        marks: Option<&StageMarks>,
    ) -> Self {
        let outcomes = declared
            .iter()
            .map(|outcome| {
                let answers: Vec<&Outcome> = all
                    .iter()
                    .filter_map(|(_, stages)| stages.stage(stage_id))
                    .filter_map(|o| o.get(&outcome.outcome_id))
                    .collect();
                let mark = marks.and_then(|m| m.get(&outcome.outcome_id));

                match &outcome.all_values {
                    Some(options) => {
                        let mut counts = vec![0; options.len()];
                        for key in answers.iter().filter_map(|a| a.key) {
                            if let Some(count) = counts.get_mut(key) {
                                *count += 1;
                            }
                        }
                        OutcomeSummary::Scale {
                            outcome_id: outcome.outcome_id.clone(),
                            explanation: outcome.explanation.clone(),
                            options: options.clone(),
                            counts,
                            marks: (0..options.len())
                                .map(|k| mark.and_then(|m| m.for_key(k)))
                                .collect(),
                        }
                    }
                    None => {
                        let values: Vec<f64> = answers.iter().filter_map(|a| a.value).collect();
                        let mean = if values.is_empty() {
                            None
                        } else {
                            Some(values.iter().sum::<f64>() / values.len() as f64)
                        };
                        OutcomeSummary::Single {
                            outcome_id: outcome.outcome_id.clone(),
                            explanation: outcome.explanation.clone(),
                            user_input: outcome.user_input,
                            count: values.len(),
                            mean,
                            mark: mark.and_then(|m| m.single()),
                        }
                    }
                }
            })
            .collect();

        Self {
            stage_id: stage_id.to_string(),
            submissions: all.len(),
            outcomes,
        }
    }
}
