//! Assessment configuration.
//!
//! Configuration is an INI-shaped YAML or JSON document: top-level sections
//! (`app`, `assessment`, `model_file`, one `stage_<id>` per stage) of flat
//! key/value pairs. It is validated against JSON Schema, converted into a
//! typed [`Config`] once, and passed explicitly to everything that needs it.

mod parser;
mod schema;
mod section;

pub use parser::{AppConfig, AssessmentConfig, Config, ConfigError, ModelFiles, StageConfig};
pub use schema::validate_config_schema;
pub use section::Section;
