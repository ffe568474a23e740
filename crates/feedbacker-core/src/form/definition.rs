//! Form definitions parsed from a stage section.
//!
//! Questions are numbered keys: `question<N>`, `type<N>`, `required<N>`,
//! `answer<N>` (a JSON label list, or the name of another key holding one),
//! `score<N>`, `feedback<N>`, `min<N>` and `max<N>`.

use super::FormError;
use crate::config::Section;
use crate::model::{Bounds, Outcome, ScaleOption};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref QUESTION_KEY: Regex = Regex::new(r"^question(\w+)$").unwrap();
}

/// What a question asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Fixed labelled options, each with a score and optional feedback
    Scale {
        options: Vec<String>,
        scores: Vec<f64>,
        feedback: Option<Vec<String>>,
    },

    /// A typed number clamped to optional bounds
    InputScore { min: Option<f64>, max: Option<f64> },

    /// Free text with no numeric contribution
    InputFeedback,
}

/// One numbered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// The `<N>` suffix; also the question's outcome and feedback id
    pub num: String,
    pub text: String,
    pub required: bool,
    pub kind: QuestionKind,
}

impl Question {
    pub fn outcome_id(&self) -> &str {
        &self.num
    }

    /// The outcome this question can produce, with nothing answered yet.
    pub fn declared_outcome(&self) -> Option<Outcome> {
        match &self.kind {
            QuestionKind::Scale {
                options, scores, ..
            } => {
                let all_values = options
                    .iter()
                    .zip(scores)
                    .map(|(label, score)| ScaleOption::new(label.clone(), *score))
                    .collect();
                Some(Outcome::scale(self.num.clone(), all_values).with_explanation(self.text.clone()))
            }
            QuestionKind::InputScore { .. } => {
                let mut outcome = Outcome::new(self.num.clone()).with_explanation(self.text.clone());
                outcome.user_input = true;
                Some(outcome)
            }
            QuestionKind::InputFeedback => None,
        }
    }

    /// Lowest and highest score this question can contribute.
    pub fn score_range(&self) -> (f64, f64) {
        match &self.kind {
            QuestionKind::Scale { scores, .. } => {
                let lo = scores.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if scores.is_empty() {
                    (0.0, 0.0)
                } else {
                    (lo, hi)
                }
            }
            QuestionKind::InputScore { min, max } => (min.unwrap_or(0.0), max.unwrap_or(0.0)),
            QuestionKind::InputFeedback => (0.0, 0.0),
        }
    }

    /// Question text decorated with bounds and a required marker.
    pub fn display_text(&self) -> String {
        let mut text = self.text.clone();
        if let QuestionKind::InputScore { min, max } = &self.kind {
            match (min, max) {
                (Some(min), Some(max)) => text.push_str(&format!(" (min: {}, max: {})", min, max)),
                (Some(min), None) => text.push_str(&format!(" (min: {})", min)),
                (None, Some(max)) => text.push_str(&format!(" (max: {})", max)),
                (None, None) => {}
            }
        }
        if self.required {
            text.push_str(" *");
        }
        text
    }
}

/// All questions of a form stage, in question-number order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub stage_id: String,
    pub questions: Vec<Question>,
}

impl FormDefinition {
    /// Parse and validate every question of a stage section.
    pub fn from_section(stage_id: &str, section: &Section) -> Result<Self, FormError> {
        let mut nums: Vec<String> = section
            .keys()
            .filter_map(|key| QUESTION_KEY.captures(key))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();
        nums.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });

        let questions = nums
            .iter()
            .map(|num| parse_question(section, num))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stage_id: stage_id.to_string(),
            questions,
        })
    }

    pub fn question(&self, num: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.num == num)
    }

    pub fn required(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.required)
    }

    /// Outcomes every question can produce.
    pub fn declared_outcomes(&self) -> Vec<Outcome> {
        self.questions
            .iter()
            .filter_map(Question::declared_outcome)
            .collect()
    }

    /// Possible score range of the whole form, narrowed by the stage bounds.
    pub fn score_range(&self, stage_bounds: Bounds) -> (f64, f64) {
        let (mut lo, mut hi) = self.questions.iter().fold((0.0, 0.0), |(lo, hi), q| {
            let (q_lo, q_hi) = q.score_range();
            let q_lo = if q.required { q_lo } else { q_lo.min(0.0) };
            (lo + q_lo, hi + q_hi)
        });
        if let Some(min) = stage_bounds.min {
            lo = lo.max(min);
        }
        if let Some(max) = stage_bounds.max {
            hi = hi.min(max);
        }
        (lo, hi)
    }
}

fn parse_number(num: &str, key: &str, raw: &str) -> Result<f64, FormError> {
    raw.trim().parse::<f64>().map_err(|_| FormError::InvalidNumber {
        question: num.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_question(section: &Section, num: &str) -> Result<Question, FormError> {
    let text = section.get(&format!("question{}", num)).unwrap_or_default().to_string();
    let required = section
        .get_bool(&format!("required{}", num))
        .map_err(|e| FormError::Config(e.to_string()))?
        .unwrap_or(false);

    let type_key = format!("type{}", num);
    let kind = match section.get(&type_key).map(str::trim) {
        Some("scale") => parse_scale(section, num)?,
        Some("input_score") => {
            let bound = |key: String| -> Result<Option<f64>, FormError> {
                section
                    .get(&key)
                    .map(|raw| parse_number(num, &key, raw))
                    .transpose()
            };
            QuestionKind::InputScore {
                min: bound(format!("min{}", num))?,
                max: bound(format!("max{}", num))?,
            }
        }
        Some("input_feedback") => QuestionKind::InputFeedback,
        Some(other) => {
            return Err(FormError::UnknownType {
                question: num.to_string(),
                kind: other.to_string(),
            })
        }
        None => {
            return Err(FormError::MissingKey {
                question: num.to_string(),
                key: type_key,
            })
        }
    };

    Ok(Question {
        num: num.to_string(),
        text,
        required,
        kind,
    })
}

fn parse_scale(section: &Section, num: &str) -> Result<QuestionKind, FormError> {
    let answer_key = format!("answer{}", num);
    let answer = section.get(&answer_key).ok_or_else(|| FormError::MissingKey {
        question: num.to_string(),
        key: answer_key.clone(),
    })?;

    // The answer either names another key holding the JSON, or is the JSON.
    let json = section.get(answer.trim()).unwrap_or(answer);
    let options: Vec<String> = serde_json::from_str(json).map_err(|e| FormError::InvalidScale {
        question: num.to_string(),
        reason: e.to_string(),
    })?;

    let scores = match section.get_list(&format!("score{}", num)) {
        Ok(Some(raw)) => {
            let key = format!("score{}", num);
            let scores = raw
                .iter()
                .map(|s| parse_number(num, &key, s))
                .collect::<Result<Vec<_>, _>>()?;
            if scores.len() != options.len() {
                return Err(FormError::ScoreCountMismatch {
                    question: num.to_string(),
                    scores: scores.len(),
                    answers: options.len(),
                });
            }
            scores
        }
        Ok(None) => vec![0.0; options.len()],
        Err(e) => return Err(FormError::Config(e.to_string())),
    };

    let feedback = section
        .get_lines(&format!("feedback{}", num))
        .map_err(|e| FormError::Config(e.to_string()))?;
    if let Some(lines) = &feedback {
        if lines.len() != options.len() {
            return Err(FormError::FeedbackCountMismatch {
                question: num.to_string(),
                feedback: lines.len(),
                answers: options.len(),
            });
        }
    }

    Ok(QuestionKind::Scale {
        options,
        scores,
        feedback,
    })
}
