//! The ordered stage registry, built once from configuration.

use super::{StageDescriptor, StageError, StageState};
use crate::config::Config;
use crate::handlers::HandlerRegistry;

/// Stages in configured order.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

impl StageRegistry {
    /// Resolve every configured stage against the handler registry.
    ///
    /// An unknown handler marks its stage FAILED and leaves the rest
    /// loadable. A handler rejecting its section is a configuration
    /// error and aborts the build.
    pub fn build(config: &Config, handlers: &HandlerRegistry) -> Result<Self, StageError> {
        let mut stages = Vec::with_capacity(config.stages.len());

        for stage in &config.stages {
            let stage_id = stage.stage_id.as_str();
            match handlers.resolve(stage_id, &stage.handler) {
                Ok(factory) => {
                    factory.validate_config(&stage.section)?;
                    tracing::debug!(stage = %stage_id, handler = %stage.handler, "Stage resolved");
                    stages.push(StageDescriptor::resolved(stage.clone(), factory.clone()));
                }
                Err(e) => {
                    tracing::warn!(stage = %stage_id, error = %e, "Stage handler not resolved");
                    stages.push(StageDescriptor::unresolved(stage.clone(), &e));
                }
            }
        }

        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.stage_id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }

    pub fn contains(&self, stage_id: &str) -> bool {
        self.position(stage_id).is_some()
    }

    pub fn descriptor(&self, stage_id: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn descriptor_mut(&mut self, stage_id: &str) -> Option<&mut StageDescriptor> {
        self.stages.iter_mut().find(|s| s.stage_id == stage_id)
    }

    pub fn first_stage_id(&self) -> Option<&str> {
        self.stages.first().map(|s| s.stage_id.as_str())
    }

    /// The stage after `stage_id`, or `None` at the end.
    pub fn next_stage_id(&self, stage_id: &str) -> Result<Option<&str>, StageError> {
        let index = self
            .position(stage_id)
            .ok_or_else(|| StageError::NotFound(stage_id.to_string()))?;
        Ok(self.stages.get(index + 1).map(|s| s.stage_id.as_str()))
    }

    pub fn state(&self, stage_id: &str) -> Option<StageState> {
        self.descriptor(stage_id).map(|s| s.state)
    }

    /// Returns false for an unknown stage.
    pub fn set_state(&mut self, stage_id: &str, state: StageState) -> bool {
        match self.descriptor_mut(stage_id) {
            Some(descriptor) => {
                descriptor.state = state;
                true
            }
            None => false,
        }
    }

    fn position(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.stage_id == stage_id)
    }
}
