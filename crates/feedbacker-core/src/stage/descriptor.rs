//! One registered stage.

use super::{StageError, StageState};
use crate::config::StageConfig;
use crate::handlers::{Handler, HandlerFactory, StageContext};
use std::sync::Arc;

/// A stage as resolved from configuration.
#[derive(Clone)]
pub struct StageDescriptor {
    pub stage_id: String,
    pub label: String,
    pub state: StageState,
    pub config: Arc<StageConfig>,

    factory: Option<Arc<dyn HandlerFactory>>,
    resolution_error: Option<String>,
}

impl StageDescriptor {
    pub(crate) fn resolved(config: StageConfig, factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            stage_id: config.stage_id.clone(),
            label: config.label.clone(),
            state: StageState::Inactive,
            config: Arc::new(config),
            factory: Some(factory),
            resolution_error: None,
        }
    }

    pub(crate) fn unresolved(config: StageConfig, error: &StageError) -> Self {
        Self {
            stage_id: config.stage_id.clone(),
            label: config.label.clone(),
            state: StageState::Failed,
            config: Arc::new(config),
            factory: None,
            resolution_error: Some(error.to_string()),
        }
    }

    /// Registered handler type name.
    pub fn handler_type(&self) -> &str {
        &self.config.handler
    }

    pub fn halt_on_error(&self) -> bool {
        self.config.halt_on_error
    }

    pub fn feedback_pre(&self) -> Option<&str> {
        self.config.feedback_pre.as_deref()
    }

    pub fn feedback_post(&self) -> Option<&str> {
        self.config.feedback_post.as_deref()
    }

    /// False when the handler could not be resolved.
    pub fn selectable(&self) -> bool {
        self.factory.is_some()
    }

    pub fn resolution_error(&self) -> Option<&str> {
        self.resolution_error.as_deref()
    }

    /// Build a fresh handler for one entry into this stage.
    pub fn instantiate(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| StageError::HandlerResolution {
                stage_id: self.stage_id.clone(),
                handler: self.config.handler.clone(),
                reason: self
                    .resolution_error
                    .clone()
                    .unwrap_or_else(|| "not resolved".to_string()),
            })?;
        factory.create(ctx)
    }
}

impl std::fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("stage_id", &self.stage_id)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("handler", &self.config.handler)
            .field("selectable", &self.selectable())
            .finish()
    }
}
