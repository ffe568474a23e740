//! Handler factories, registered by type name.
//!
//! A stage's `handler` key names a registered factory. New handler kinds
//! are added by registering a factory; the registry replaces loading
//! stage code by name at run time.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = HandlerRegistry::with_defaults();
//! registry.register(Arc::new(MyHandlerFactory));
//!
//! let handler = registry.create("my_handler", &ctx)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Handler, StageContext};
use crate::config::Section;
use crate::stage::StageError;

/// Factory for creating stage handlers.
///
/// Each factory:
/// 1. Validates its stage's configuration when the registry is built
/// 2. Creates one handler per stage entry
/// 3. Provides a unique type name
pub trait HandlerFactory: Send + Sync {
    /// Unique type name used in a stage's `handler` key.
    ///
    /// Examples: "none", "form", "process"
    fn handler_type(&self) -> &'static str;

    /// Create a handler for one stage entry.
    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError>;

    /// Validate the stage section without creating a handler.
    ///
    /// Errors here abort registry construction.
    fn validate_config(&self, _section: &Section) -> Result<(), StageError> {
        Ok(())
    }

    /// Human-readable description of this handler.
    fn description(&self) -> &'static str {
        "Stage handler"
    }
}

/// Registry of available handler factories.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    factories: BTreeMap<String, Arc<dyn HandlerFactory>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler factory, replacing one with the same type.
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory>) {
        self.factories
            .insert(factory.handler_type().to_string(), factory);
    }

    /// Create a handler from type name and stage context.
    pub fn create(
        &self,
        handler_type: &str,
        ctx: &StageContext,
    ) -> Result<Box<dyn Handler>, StageError> {
        self.resolve(&ctx.stage_id, handler_type)?.create(ctx)
    }

    /// Validate a stage section for a handler type.
    pub fn validate(&self, handler_type: &str, section: &Section) -> Result<(), StageError> {
        self.resolve(section.name(), handler_type)?
            .validate_config(section)
    }

    /// Look up a factory, failing with a resolution error.
    pub fn resolve(
        &self,
        stage_id: &str,
        handler_type: &str,
    ) -> Result<&Arc<dyn HandlerFactory>, StageError> {
        self.factories
            .get(handler_type)
            .ok_or_else(|| StageError::HandlerResolution {
                stage_id: stage_id.to_string(),
                handler: handler_type.to_string(),
                reason: format!("unknown handler type. Available: {:?}", self.available_types()),
            })
    }

    /// List available handler types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a handler type is registered.
    pub fn has_handler(&self, handler_type: &str) -> bool {
        self.factories.contains_key(handler_type)
    }

    /// Get the factory for a handler type.
    pub fn get_factory(&self, handler_type: &str) -> Option<&Arc<dyn HandlerFactory>> {
        self.factories.get(handler_type)
    }

    /// Create a registry with every built-in handler registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::NoneHandlerFactory));
        registry.register(Arc::new(super::TextHandlerFactory));
        registry.register(Arc::new(super::EditTextHandlerFactory));
        registry.register(Arc::new(super::FormHandlerFactory));
        registry.register(Arc::new(super::ProcessHandlerFactory::default()));
        registry.register(Arc::new(super::SelectiveFeedbackHandlerFactory));
        registry.register(Arc::new(super::SubmissionCheckHandlerFactory));
        registry
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.available_types())
            .finish()
    }
}
