//! Flat key/value configuration sections.

use super::ConfigError;
use serde_json::Value;
use std::collections::BTreeMap;

/// One named section of string values with typed getters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    name: String,
    entries: BTreeMap<String, String>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Build from a JSON object of scalars or scalar arrays.
    ///
    /// Numbers and booleans become their string form, arrays become JSON
    /// text and nulls are dropped.
    pub(crate) fn from_value(name: &str, value: &Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or_else(|| ConfigError::InvalidValue {
            section: name.to_string(),
            key: String::new(),
            reason: "section must be a map".to_string(),
        })?;

        let mut section = Section::new(name);
        for (key, value) in object {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) => serde_json::to_string(value)?,
                Value::Object(_) => {
                    return Err(ConfigError::InvalidValue {
                        section: name.to_string(),
                        key: key.clone(),
                        reason: "nested maps are not supported".to_string(),
                    })
                }
            };
            section.entries.insert(key.clone(), text);
        }
        Ok(section)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A value that must be present.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingField(format!("{}.{}", self.name, key)))
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.clone(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            other => Err(self.invalid(key, format!("'{}' is not a boolean", other))),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| self.invalid(key, format!("'{}' is not a number", raw)))
    }

    /// A list written either as a JSON array or as comma-separated text.
    pub fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        split_list(raw, ',')
            .map(Some)
            .map_err(|reason| self.invalid(key, reason))
    }

    /// A list written either as a JSON array or as newline-separated text.
    pub fn get_lines(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        split_list(raw.trim(), '\n')
            .map(Some)
            .map_err(|reason| self.invalid(key, reason))
    }
}

fn split_list(raw: &str, separator: char) -> Result<Vec<String>, String> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        let items: Vec<Value> =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid list: {}", e))?;
        return Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect());
    }

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(raw
        .split(separator)
        .map(|item| item.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        Section::from_value(
            "stage_form",
            &serde_json::json!({
                "label": "Form",
                "required1": "yes",
                "score1": [0, 5, 10],
                "score2": "0, 2.5",
                "feedback1": "Poor\nOkay\nGreat\n",
                "max2": 4,
                "empty": null
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_scalars_are_stringified() {
        let s = section();
        assert_eq!(s.get("label"), Some("Form"));
        assert_eq!(s.get("max2"), Some("4"));
        assert!(!s.contains("empty"));
    }

    #[test]
    fn test_typed_getters() {
        let s = section();
        assert_eq!(s.get_bool("required1").unwrap(), Some(true));
        assert_eq!(s.get_f64("max2").unwrap(), Some(4.0));
        assert_eq!(s.get_f64("missing").unwrap(), None);
        assert!(s.get_bool("label").is_err());
        assert!(s.get_f64("label").is_err());
    }

    #[test]
    fn test_lists_accept_json_or_separated_text() {
        let s = section();
        assert_eq!(s.get_list("score1").unwrap().unwrap(), vec!["0", "5", "10"]);
        assert_eq!(s.get_list("score2").unwrap().unwrap(), vec!["0", "2.5"]);
        assert_eq!(
            s.get_lines("feedback1").unwrap().unwrap(),
            vec!["Poor", "Okay", "Great"]
        );
    }

    #[test]
    fn test_require_names_section() {
        let err = section().require("handler").unwrap_err();
        assert!(err.to_string().contains("stage_form.handler"));
    }
}
