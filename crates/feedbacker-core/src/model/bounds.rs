//! Optional score and mark bounds.
//!
//! Every aggregation level (stage, submission, mark application) clamps its
//! sum independently. The maximum is applied before the minimum, so a
//! misconfigured `min > max` pair yields `min`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An optional minimum and maximum applied after summation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Bounds {
    /// Bounds that leave every value untouched.
    pub const UNBOUNDED: Bounds = Bounds {
        min: None,
        max: None,
    };

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Clamp a summed value: `if sum > max { max }`, then `if sum < min { min }`.
    pub fn clamp(&self, sum: f64) -> f64 {
        let mut value = sum;
        if let Some(max) = self.max {
            if value > max {
                value = max;
            }
        }
        if let Some(min) = self.min {
            if value < min {
                value = min;
            }
        }
        value
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Overall bounds plus per-stage bounds for one quantity (scores or marks).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundsTable {
    pub overall: Bounds,
    pub stages: BTreeMap<String, Bounds>,
}

impl BoundsTable {
    pub fn new(overall: Bounds) -> Self {
        Self {
            overall,
            stages: BTreeMap::new(),
        }
    }

    pub fn with_stage(mut self, stage_id: impl Into<String>, bounds: Bounds) -> Self {
        self.stages.insert(stage_id.into(), bounds);
        self
    }

    /// Bounds for a stage; unconfigured stages are unbounded.
    pub fn for_stage(&self, stage_id: &str) -> Bounds {
        self.stages.get(stage_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_unbounded_passes_through() {
        assert_eq!(Bounds::UNBOUNDED.clamp(-12.5), -12.5);
        assert_eq!(Bounds::UNBOUNDED.clamp(1e9), 1e9);
    }

    #[test]
    fn test_clamp_max_then_min() {
        let bounds = Bounds::new(Some(0.0), Some(10.0));
        assert_eq!(bounds.clamp(12.0), 10.0);
        assert_eq!(bounds.clamp(-3.0), 0.0);
        assert_eq!(bounds.clamp(4.0), 4.0);
    }

    #[test]
    fn test_clamp_inverted_bounds_yields_min() {
        // max is checked first, so min wins when both are unreachable
        let bounds = Bounds::new(Some(5.0), Some(2.0));
        assert_eq!(bounds.clamp(10.0), 5.0);
        assert_eq!(bounds.clamp(0.0), 5.0);
    }

    #[test]
    fn test_table_defaults_to_unbounded() {
        let table = BoundsTable::new(Bounds::new(Some(0.0), None))
            .with_stage("a", Bounds::new(None, Some(3.0)));
        assert_eq!(table.for_stage("a").max, Some(3.0));
        assert!(table.for_stage("missing").is_unbounded());
    }

    proptest! {
        #[test]
        fn prop_clamp_respects_ordered_bounds(
            values in prop::collection::vec(-100.0f64..100.0, 0..20),
            lo in -50.0f64..0.0,
            hi in 0.0f64..50.0,
        ) {
            let sum: f64 = values.iter().sum();
            let clamped = Bounds::new(Some(lo), Some(hi)).clamp(sum);
            prop_assert!(clamped <= hi);
            prop_assert!(clamped >= lo);
        }

        #[test]
        fn prop_clamp_is_idempotent(
            sum in -1000.0f64..1000.0,
            lo in proptest::option::of(-50.0f64..50.0),
            hi in proptest::option::of(-50.0f64..50.0),
        ) {
            let bounds = Bounds::new(lo, hi);
            let once = bounds.clamp(sum);
            prop_assert_eq!(bounds.clamp(once), once);
        }
    }
}
