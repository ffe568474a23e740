//! Stage lifecycle: descriptors, the ordered registry, results and outputs.

mod descriptor;
mod output;
mod registry;
mod result;

pub use descriptor::StageDescriptor;
pub use output::{ChecklistItem, MarkerSummary, OutcomeSummary, StageOutput};
pub use registry::StageRegistry;
pub use result::{ResultKind, StageResult};

use crate::config::ConfigError;
use crate::form::FormError;
use crate::model::ModelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one stage: INACTIVE -> ACTIVE -> {COMPLETE | FAILED}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageState {
    #[default]
    Inactive,
    Active,
    Complete,
    Failed,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageState::Inactive => "INACTIVE",
            StageState::Active => "ACTIVE",
            StageState::Complete => "COMPLETE",
            StageState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Errors raised by stage lookup, sequencing and handler construction.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("The id {0} does not correspond to an expected stage")]
    InvalidStage(String),

    #[error("Stage {0} is not ready to execute")]
    NotReady(String),

    #[error("Stage {0} is not registered")]
    NotFound(String),

    /// Safe to swallow; the caller shows the stage unchanged
    #[error("{0}")]
    Ignorable(String),

    #[error("Cannot resolve handler '{handler}' for stage {stage_id}: {reason}")]
    HandlerResolution {
        stage_id: String,
        handler: String,
        reason: String,
    },

    #[error("Failed to start stage handler: {0}")]
    HandlerConstruction(String),

    #[error("Stage {0} does not accept input")]
    NotInteractive(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Form error: {0}")]
    Form(#[from] FormError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl StageError {
    pub fn is_ignorable(&self) -> bool {
        matches!(self, StageError::Ignorable(_))
    }
}
