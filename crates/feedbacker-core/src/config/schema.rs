//! JSON Schema validation for configuration documents.
//!
//! The schema checks document shape only (sections are flat maps, stage
//! sections carry a label and handler). Typed values are checked when the
//! document is converted into a [`super::Config`].

use std::sync::OnceLock;

/// Embedded configuration schema (loaded at compile time).
const CONFIG_SCHEMA_JSON: &str = include_str!("../../schema/config.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a configuration document against the schema.
///
/// # Returns
///
/// * `Ok(())` - Document has a valid shape
/// * `Err(Vec<String>)` - List of validation errors with their paths
pub fn validate_config_schema(document: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_passes() {
        let value = serde_json::json!({
            "assessment": { "stages": "a" },
            "stage_a": { "label": "A", "handler": "none" }
        });
        assert!(validate_config_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_assessment_fails() {
        let value = serde_json::json!({ "app": { "name": "x" } });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_stage_without_handler_fails() {
        let value = serde_json::json!({
            "assessment": { "stages": ["a"] },
            "stage_a": { "label": "A" }
        });
        let errors = validate_config_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_nested_map_in_section_fails() {
        let value = serde_json::json!({
            "assessment": { "stages": "a" },
            "stage_a": { "label": "A", "handler": "none", "nested": { "x": 1 } }
        });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_list_values_pass() {
        let value = serde_json::json!({
            "assessment": { "stages": ["a", "b"], "score_max": 10 },
            "stage_a": { "label": "A", "handler": "form", "score1": [0, 5, 10] },
            "stage_b": { "label": "B", "handler": "none" }
        });
        assert!(validate_config_schema(&value).is_ok());
    }
}
