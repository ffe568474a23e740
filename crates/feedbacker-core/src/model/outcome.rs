//! A single graded fact for one stage of one submission.

use super::ModelError;
use serde::{Deserialize, Serialize};

/// One labelled option of a discrete scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleOption {
    pub label: String,
    pub value: f64,
}

impl ScaleOption {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// The atomic graded fact produced by a stage.
///
/// When `all_values` is set, `value` always equals `all_values[key].value`
/// while a key is selected. Use [`Outcome::select`] to change the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_id: String,

    /// Selected scale option index
    #[serde(default)]
    pub key: Option<usize>,

    #[serde(default)]
    pub explanation: Option<String>,

    #[serde(default)]
    pub value: Option<f64>,

    /// Ordered scale options, if this outcome is scale based
    #[serde(default)]
    pub all_values: Option<Vec<ScaleOption>>,

    /// True if `value` was typed freely, making a later mark a multiplier
    #[serde(default)]
    pub user_input: bool,
}

impl Outcome {
    /// An outcome with no value yet.
    pub fn new(outcome_id: impl Into<String>) -> Self {
        Self {
            outcome_id: outcome_id.into(),
            key: None,
            explanation: None,
            value: None,
            all_values: None,
            user_input: false,
        }
    }

    /// A fixed, programmatically determined value (e.g. pass or fail).
    pub fn fixed(outcome_id: impl Into<String>, value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::new(outcome_id)
        }
    }

    /// A value typed by the user.
    pub fn user_input(outcome_id: impl Into<String>, value: f64) -> Self {
        Self {
            value: Some(value),
            user_input: true,
            ..Self::new(outcome_id)
        }
    }

    /// A scale outcome with no option selected.
    pub fn scale(outcome_id: impl Into<String>, all_values: Vec<ScaleOption>) -> Self {
        Self {
            all_values: Some(all_values),
            ..Self::new(outcome_id)
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Builder form of [`Outcome::select`].
    pub fn with_key(mut self, key: usize) -> Result<Self, ModelError> {
        self.select(key)?;
        Ok(self)
    }

    pub fn is_scale(&self) -> bool {
        self.all_values.is_some()
    }

    /// Select a scale option, updating `value` to match.
    pub fn select(&mut self, key: usize) -> Result<(), ModelError> {
        let options = self
            .all_values
            .as_ref()
            .ok_or_else(|| ModelError::NotScale(self.outcome_id.clone()))?;

        let option = options.get(key).ok_or_else(|| ModelError::KeyOutOfRange {
            outcome_id: self.outcome_id.clone(),
            key,
            len: options.len(),
        })?;

        self.value = Some(option.value);
        self.key = Some(key);
        Ok(())
    }

    /// Label of the selected option, if any.
    pub fn selected_label(&self) -> Option<&str> {
        let key = self.key?;
        self.all_values
            .as_ref()
            .and_then(|options| options.get(key))
            .map(|option| option.label.as_str())
    }

    /// Check the scale invariant.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let (Some(options), Some(key)) = (&self.all_values, self.key) {
            let option = options.get(key).ok_or_else(|| ModelError::KeyOutOfRange {
                outcome_id: self.outcome_id.clone(),
                key,
                len: options.len(),
            })?;
            if self.value != Some(option.value) {
                return Err(ModelError::ScaleMismatch(self.outcome_id.clone()));
            }
        }
        Ok(())
    }

    /// Overwrite the fields that are set in `other` and differ here.
    ///
    /// Returns true if anything changed. Unset fields in `other` leave the
    /// existing data alone, so a value-only update keeps the explanation.
    pub fn merge_from(&mut self, other: &Outcome) -> bool {
        let mut changed = false;

        if other.all_values.is_some() && self.all_values != other.all_values {
            self.all_values = other.all_values.clone();
            changed = true;
        }
        if other.key.is_some() && self.key != other.key {
            self.key = other.key;
            changed = true;
        }
        if other.explanation.is_some() && self.explanation != other.explanation {
            self.explanation = other.explanation.clone();
            changed = true;
        }
        if other.value.is_some() && self.value != other.value {
            self.value = other.value;
            changed = true;
        }
        if other.user_input && !self.user_input {
            self.user_input = true;
            changed = true;
        }

        changed
    }
}
