//! Dynamic form evaluator.
//!
//! A form stage's section declares numbered questions of three kinds
//! (`scale`, `input_score`, `input_feedback`). Definitions are validated
//! when the stage registry is built; answers are tracked per submission
//! until no required question is outstanding.

mod definition;
mod progress;

pub use definition::{FormDefinition, Question, QuestionKind};
pub use progress::{clamp_input, FormAnswer, FormProgress, FormUpdate};

use crate::model::ModelError;
use thiserror::Error;

/// Errors in form configuration or answers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Question {question} is missing key '{key}'")]
    MissingKey { question: String, key: String },

    #[error("Unrecognised question type: {kind} for question {question}")]
    UnknownType { question: String, kind: String },

    #[error("Invalid scale JSON for question {question}: {reason}")]
    InvalidScale { question: String, reason: String },

    #[error(
        "Mismatch with number of score values ({scores}) vs. number of answers ({answers}) for question {question}"
    )]
    ScoreCountMismatch {
        question: String,
        scores: usize,
        answers: usize,
    },

    #[error(
        "Mismatch with number of feedback responses ({feedback}) vs. number of answers ({answers}) in question {question}"
    )]
    FeedbackCountMismatch {
        question: String,
        feedback: usize,
        answers: usize,
    },

    #[error("Invalid number '{value}' for {key} in question {question}")]
    InvalidNumber {
        question: String,
        key: String,
        value: String,
    },

    #[error("Invalid form configuration: {0}")]
    Config(String),

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Answer {answer} does not fit question {question}")]
    AnswerMismatch { question: String, answer: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}
