//! Marks: point values for an outcome's possible answers.
//!
//! Marks are keyed by stage and outcome id only. They apply across every
//! submission and are adjusted once in marking mode.

use super::ordered::OrderedMap;
use super::outcome::Outcome;
use super::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single mark, or one mark per scale key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mark {
    Single(f64),
    /// Keyed by the scale index rendered as a string
    Scale(BTreeMap<String, f64>),
}

impl Mark {
    /// Per-key mark for a scale key.
    pub fn for_key(&self, key: usize) -> Option<f64> {
        match self {
            Mark::Scale(per_key) => per_key.get(&key.to_string()).copied(),
            Mark::Single(_) => None,
        }
    }

    pub fn single(&self) -> Option<f64> {
        match self {
            Mark::Single(mark) => Some(*mark),
            Mark::Scale(_) => None,
        }
    }
}

/// Contribution of one outcome in marking mode.
///
/// Resolution order:
/// 1. no value: skipped (`None`)
/// 2. user input with a single mark: `value * mark`
/// 3. a selected key with a per-key mark: that mark
/// 4. otherwise the raw value
pub fn resolve(outcome: &Outcome, mark: Option<&Mark>) -> Option<f64> {
    let value = outcome.value?;

    if outcome.user_input {
        if let Some(factor) = mark.and_then(Mark::single) {
            return Some(value * factor);
        }
    }

    if let (Some(key), Some(mark)) = (outcome.key, mark) {
        if let Some(per_key) = mark.for_key(key) {
            return Some(per_key);
        }
    }

    Some(value)
}

/// Marks of one stage, keyed by outcome id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageMarks {
    outcomes: OrderedMap<Mark>,
}

impl StageMarks {
    pub fn get(&self, outcome_id: &str) -> Option<&Mark> {
        self.outcomes.get(outcome_id)
    }

    pub fn contains(&self, outcome_id: &str) -> bool {
        self.outcomes.contains_key(outcome_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mark)> {
        self.outcomes.iter()
    }

    /// Set a single mark. A scale outcome's per-key table is never
    /// replaced this way.
    pub fn set_single(&mut self, outcome_id: &str, mark: f64) -> Result<(), ModelError> {
        if let Some(Mark::Scale(_)) = self.outcomes.get(outcome_id) {
            return Err(ModelError::KeyRequired(outcome_id.to_string()));
        }
        self.outcomes.insert(outcome_id, Mark::Single(mark));
        Ok(())
    }

    /// Set the mark of one scale key, converting a single mark if needed.
    pub fn set_key(&mut self, outcome_id: &str, key: usize, mark: f64) {
        let entry = self
            .outcomes
            .get_or_insert_with(outcome_id, || Mark::Scale(BTreeMap::new()));
        if let Mark::Single(_) = *entry {
            *entry = Mark::Scale(BTreeMap::new());
        }
        if let Mark::Scale(per_key) = entry {
            per_key.insert(key.to_string(), mark);
        }
    }

    /// Seed marks for a declared outcome without touching existing ones.
    ///
    /// Scale outcomes get one mark per option (the option's value). Single
    /// outcomes get `1.0` when user input, else the declared value.
    /// Returns true if anything was added.
    pub fn seed(&mut self, outcome: &Outcome) -> bool {
        match &outcome.all_values {
            Some(options) => {
                let entry = self
                    .outcomes
                    .get_or_insert_with(&outcome.outcome_id, || Mark::Scale(BTreeMap::new()));
                let per_key = match entry {
                    Mark::Scale(per_key) => per_key,
                    Mark::Single(_) => return false,
                };
                let mut added = false;
                for (index, option) in options.iter().enumerate() {
                    per_key.entry(index.to_string()).or_insert_with(|| {
                        added = true;
                        option.value
                    });
                }
                added
            }
            None => {
                if self.outcomes.contains_key(&outcome.outcome_id) {
                    return false;
                }
                let mark = if outcome.user_input {
                    1.0
                } else {
                    outcome.value.unwrap_or(0.0)
                };
                self.outcomes.insert(outcome.outcome_id.clone(), Mark::Single(mark));
                true
            }
        }
    }
}

/// Marks of every stage, keyed by stage id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllMarks {
    stages: OrderedMap<StageMarks>,
}

impl AllMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageMarks> {
        self.stages.get(stage_id)
    }

    /// Get-or-create the marks of a stage.
    pub fn stage_mut(&mut self, stage_id: &str) -> &mut StageMarks {
        self.stages.entry(stage_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageMarks)> {
        self.stages.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
