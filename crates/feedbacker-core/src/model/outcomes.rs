//! Outcome containers and score aggregation.
//!
//! Three levels: [`Outcomes`] per stage, [`OutcomesByStage`] per submission
//! and [`AllOutcomes`] across submissions. Scores are derived on every read
//! and clamped at each level.

use super::bounds::BoundsTable;
use super::marks::{AllMarks, StageMarks};
use super::ordered::OrderedMap;
use super::outcome::Outcome;
use serde::{Deserialize, Serialize};

/// Outcomes of one stage for one submission, keyed by outcome id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcomes {
    entries: OrderedMap<Outcome>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outcome_id: &str) -> Option<&Outcome> {
        self.entries.get(outcome_id)
    }

    pub fn contains(&self, outcome_id: &str) -> bool {
        self.entries.contains_key(outcome_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter()
    }

    pub fn remove(&mut self, outcome_id: &str) -> Option<Outcome> {
        self.entries.remove(outcome_id)
    }

    /// Store `outcome` under `outcome_id`.
    ///
    /// An outcome is identified by its recorded `outcome_id`. If that id is
    /// already a key here and differs from the target key, the outcome is
    /// being moved: the old entry is removed first so it has one owner.
    /// An existing entry at the target key is merged field by field.
    /// The stored outcome's id always equals its key afterwards.
    pub fn set(&mut self, outcome_id: &str, mut outcome: Outcome) {
        if outcome.outcome_id != outcome_id && self.entries.contains_key(&outcome.outcome_id) {
            self.entries.remove(&outcome.outcome_id);
        }

        outcome.outcome_id = outcome_id.to_string();
        match self.entries.get_mut(outcome_id) {
            Some(existing) => {
                existing.merge_from(&outcome);
            }
            None => {
                self.entries.insert(outcome_id, outcome);
            }
        }
    }

    /// Sum of present values, unclamped.
    pub fn raw_sum(&self) -> f64 {
        self.entries.values().filter_map(|o| o.value).sum()
    }

    /// Sum of present values clamped by the stage bounds in `bounds`.
    pub fn score(&self, stage_id: &str, bounds: &BoundsTable) -> f64 {
        bounds.for_stage(stage_id).clamp(self.raw_sum())
    }

    /// Sum of mark contributions clamped by the stage mark bounds.
    pub fn mark(&self, stage_id: &str, marks: Option<&StageMarks>, bounds: &BoundsTable) -> f64 {
        let sum: f64 = self
            .entries
            .values()
            .filter_map(|outcome| {
                let mark = marks.and_then(|m| m.get(&outcome.outcome_id));
                super::marks::resolve(outcome, mark)
            })
            .sum();
        bounds.for_stage(stage_id).clamp(sum)
    }
}

/// All stage outcomes for one submission, keyed by stage id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomesByStage {
    stages: OrderedMap<Outcomes>,
}

impl OutcomesByStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Outcomes> {
        self.stages.get(stage_id)
    }

    /// Get-or-create the outcomes of a stage.
    pub fn stage_mut(&mut self, stage_id: &str) -> &mut Outcomes {
        self.stages.entry(stage_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcomes)> {
        self.stages.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.values().all(Outcomes::is_empty)
    }

    pub fn remove_stage(&mut self, stage_id: &str) -> Option<Outcomes> {
        self.stages.remove(stage_id)
    }

    /// Score of a single stage; an absent stage scores its clamped zero.
    pub fn stage_score(&self, stage_id: &str, bounds: &BoundsTable) -> f64 {
        match self.stages.get(stage_id) {
            Some(outcomes) => outcomes.score(stage_id, bounds),
            None => bounds.for_stage(stage_id).clamp(0.0),
        }
    }

    /// Clamped sum of the clamped stage scores.
    pub fn score(&self, bounds: &BoundsTable) -> f64 {
        let sum: f64 = self
            .stages
            .iter()
            .map(|(stage_id, outcomes)| outcomes.score(stage_id, bounds))
            .sum();
        bounds.overall.clamp(sum)
    }

    pub fn stage_mark(&self, stage_id: &str, marks: &AllMarks, bounds: &BoundsTable) -> f64 {
        match self.stages.get(stage_id) {
            Some(outcomes) => outcomes.mark(stage_id, marks.stage(stage_id), bounds),
            None => bounds.for_stage(stage_id).clamp(0.0),
        }
    }

    /// Clamped sum of the clamped stage marks.
    pub fn mark(&self, marks: &AllMarks, bounds: &BoundsTable) -> f64 {
        let sum: f64 = self
            .stages
            .iter()
            .map(|(stage_id, outcomes)| outcomes.mark(stage_id, marks.stage(stage_id), bounds))
            .sum();
        bounds.overall.clamp(sum)
    }
}

/// Outcomes of every submission, keyed by submission id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllOutcomes {
    submissions: OrderedMap<OutcomesByStage>,
}

impl AllOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission(&self, submission: &str) -> Option<&OutcomesByStage> {
        self.submissions.get(submission)
    }

    /// Get-or-create the outcomes of a submission.
    pub fn submission_mut(&mut self, submission: &str) -> &mut OutcomesByStage {
        self.submissions.entry(submission)
    }

    pub fn contains(&self, submission: &str) -> bool {
        self.submissions.contains_key(submission)
    }

    pub fn remove(&mut self, submission: &str) -> Option<OutcomesByStage> {
        self.submissions.remove(submission)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutcomesByStage)> {
        self.submissions.iter()
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    /// Every (stage id, outcome id) pair in first-seen order.
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut columns: Vec<(String, String)> = Vec::new();
        for (_, stages) in self.submissions.iter() {
            for (stage_id, outcomes) in stages.iter() {
                for (outcome_id, _) in outcomes.iter() {
                    let column = (stage_id.to_string(), outcome_id.to_string());
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bounds::Bounds;
    use crate::model::outcome::ScaleOption;
    use proptest::prelude::*;

    fn scale() -> Vec<ScaleOption> {
        vec![
            ScaleOption::new("A", 0.0),
            ScaleOption::new("B", 2.0),
            ScaleOption::new("C", 4.0),
            ScaleOption::new("D", 6.0),
            ScaleOption::new("E", 8.0),
        ]
    }

    #[test]
    fn test_set_assigns_key_as_id() {
        let mut outcomes = Outcomes::new();
        outcomes.set("outcome_id_1", Outcome::fixed("", 1.0));
        assert_eq!(outcomes.get("outcome_id_1").unwrap().outcome_id, "outcome_id_1");
    }

    #[test]
    fn test_set_moves_outcome_between_keys() {
        let mut outcomes = Outcomes::new();
        let outcome = Outcome::scale("outcome_id_2", scale()).with_key(1).unwrap();
        outcomes.set("outcome_id_2", outcome.clone());
        outcomes.set("outcome_id_3", outcome);

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes.contains("outcome_id_2"));
        let moved = outcomes.get("outcome_id_3").unwrap();
        assert_eq!(moved.outcome_id, "outcome_id_3");
        assert_eq!(moved.value, Some(2.0));
    }

    #[test]
    fn test_set_merges_existing_key() {
        let mut outcomes = Outcomes::new();
        outcomes.set(
            "o",
            Outcome::fixed("o", 1.0).with_explanation("A sample explanation"),
        );
        outcomes.set("o", Outcome::fixed("o", 2.0));

        let merged = outcomes.get("o").unwrap();
        assert_eq!(merged.value, Some(2.0));
        assert_eq!(merged.explanation.as_deref(), Some("A sample explanation"));
    }

    #[test]
    fn test_stage_score_sums_and_clamps() {
        let mut outcomes = Outcomes::new();
        outcomes.set("a", Outcome::fixed("a", 1.0));
        outcomes.set("b", Outcome::scale("b", scale()).with_key(4).unwrap());
        outcomes.set("c", Outcome::user_input("c", 3.0));
        outcomes.set("d", Outcome::new("d"));

        assert_eq!(outcomes.raw_sum(), 12.0);
        let bounds = BoundsTable::default().with_stage("s", Bounds::new(Some(0.0), Some(10.0)));
        assert_eq!(outcomes.score("s", &bounds), 10.0);
        assert_eq!(outcomes.score("other", &bounds), 12.0);
    }

    #[test]
    fn test_submission_score_clamps_sum_of_stage_scores() {
        let mut submission = OutcomesByStage::new();
        submission.stage_mut("s1").set("a", Outcome::fixed("a", 8.0));
        submission.stage_mut("s2").set("b", Outcome::fixed("b", 8.0));

        let bounds = BoundsTable::new(Bounds::new(None, Some(12.0)))
            .with_stage("s1", Bounds::new(None, Some(5.0)));
        assert_eq!(submission.stage_score("s1", &bounds), 5.0);
        assert_eq!(submission.score(&bounds), 12.0);
        assert_eq!(submission.stage_score("absent", &bounds), 0.0);
    }

    #[test]
    fn test_all_outcomes_get_or_create() {
        let mut all = AllOutcomes::new();
        assert!(all.submission("submission_1234").is_none());
        all.submission_mut("submission_1234")
            .stage_mut("stage_id_1")
            .set("x", Outcome::fixed("x", 1.5));
        assert!(all.contains("submission_1234"));
        assert_eq!(
            all.columns(),
            vec![("stage_id_1".to_string(), "x".to_string())]
        );
    }

    #[test]
    fn test_json_shape_is_nested_maps() {
        let mut all = AllOutcomes::new();
        all.submission_mut("s")
            .stage_mut("init")
            .set("submitted", Outcome::fixed("submitted", 1.0));
        let json = serde_json::to_value(&all).unwrap();
        assert_eq!(json["s"]["init"]["submitted"]["value"], 1.0);

        let back: AllOutcomes = serde_json::from_value(json).unwrap();
        assert_eq!(back, all);
    }

    proptest! {
        #[test]
        fn prop_stage_score_within_bounds(
            values in prop::collection::vec(-20.0f64..20.0, 0..30),
            lo in -10.0f64..0.0,
            hi in 0.0f64..10.0,
        ) {
            let mut outcomes = Outcomes::new();
            for (i, v) in values.iter().enumerate() {
                outcomes.set(&format!("o{}", i), Outcome::fixed(format!("o{}", i), *v));
            }
            let bounds = BoundsTable::default().with_stage("s", Bounds::new(Some(lo), Some(hi)));
            let score = outcomes.score("s", &bounds);
            prop_assert!(score >= lo && score <= hi);
        }

        #[test]
        fn prop_set_keeps_single_owner(moves in prop::collection::vec(0usize..4, 1..12)) {
            let mut outcomes = Outcomes::new();
            let mut current = format!("k{}", moves[0]);
            outcomes.set(&current, Outcome::fixed(current.clone(), 1.0));
            for target in &moves[1..] {
                let target = format!("k{}", target);
                let outcome = outcomes.get(&current).cloned().unwrap();
                outcomes.set(&target, outcome);
                current = target;
            }
            prop_assert_eq!(outcomes.len(), 1);
            prop_assert_eq!(&outcomes.get(&current).unwrap().outcome_id, &current);
        }
    }
}
