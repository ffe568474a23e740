//! # feedbacker-core
//!
//! Stage model and scoring engine for marking student submissions.
//!
//! An assessment is an ordered list of stages. Each stage runs a handler
//! that contributes outcomes (numeric facts) and feedback text to a
//! submission. This crate holds everything that does not need a thread:
//! - configuration, parsed once into a typed [`Config`]
//! - the outcomes/feedback/marks [`Model`] with clamped aggregation
//! - the form evaluator
//! - stage descriptors, the ordered [`StageRegistry`] and the handler contract
//! - report rendering and the [`View`] interface
//!
//! Orchestration lives in `feedbacker-runtime`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedbacker_core::{Config, HandlerRegistry, StageRegistry};
//!
//! let config = Config::from_yaml_file("assessment.yaml")?;
//! let stages = StageRegistry::build(&config, &HandlerRegistry::with_defaults())?;
//!
//! for stage in stages.iter() {
//!     println!("{}: {} ({})", stage.stage_id, stage.label, stage.state);
//! }
//! ```

pub mod config;
pub mod form;
pub mod handlers;
pub mod model;
pub mod report;
pub mod stage;
pub mod view;

// Re-export main types at crate root
pub use config::{Config, ConfigError, Section, StageConfig};
pub use form::{FormAnswer, FormDefinition, FormError, FormProgress};
pub use handlers::{
    Handler, HandlerFactory, HandlerInput, HandlerRegistry, HandlerVariant, InputUpdate,
    StageContext,
};
pub use model::{
    AllFeedback, AllMarks, AllOutcomes, Bounds, BoundsTable, Mark, Model, ModelError, Outcome,
    Outcomes, ScaleOption,
};
pub use stage::{
    ResultKind, StageDescriptor, StageError, StageOutput, StageRegistry, StageResult, StageState,
};
pub use view::{Alert, AlertAction, NullView, View};

use thiserror::Error;

/// Any error raised by the core.
#[derive(Error, Debug)]
pub enum FeedbackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Form error: {0}")]
    Form(#[from] FormError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),
}

impl FeedbackerError {
    /// True for errors caused by the configuration document.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            FeedbackerError::Config(_)
                | FeedbackerError::Form(_)
                | FeedbackerError::Stage(StageError::Config(_))
                | FeedbackerError::Stage(StageError::Form(_))
        )
    }
}
