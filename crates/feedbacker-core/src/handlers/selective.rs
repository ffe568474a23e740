//! Feedback chosen by the score reached so far.
//!
//! Keys of the form `selective_<lo>_<hi>` hold feedback text. The first
//! range (ordered by `lo`) containing the submission's current score
//! wins. The chosen text is shown editable and becomes the stage's
//! feedback.

use super::{Handler, HandlerFactory, HandlerInput, HandlerVariant, InputUpdate, StageContext};
use crate::config::{ConfigError, Section};
use crate::model::Outcomes;
use crate::stage::{StageError, StageOutput, StageResult};
use lazy_static::lazy_static;
use regex::Regex;

/// Feedback id used for the selected text.
pub const SELECTIVE_FIELD: &str = "selective";

lazy_static! {
    static ref RANGE_KEY: Regex =
        Regex::new(r"^selective_(-?\d+(?:\.\d+)?)_(-?\d+(?:\.\d+)?)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
struct Range {
    lo: f64,
    hi: f64,
    text: String,
}

fn parse_ranges(section: &Section) -> Result<Vec<Range>, ConfigError> {
    let mut ranges = Vec::new();
    for (key, text) in section.iter() {
        let Some(caps) = RANGE_KEY.captures(key) else {
            continue;
        };
        let bound = |i: usize| -> Result<f64, ConfigError> {
            caps[i].parse::<f64>().map_err(|e| ConfigError::InvalidValue {
                section: section.name().to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })
        };
        let (lo, hi) = (bound(1)?, bound(2)?);
        if lo > hi {
            return Err(ConfigError::InvalidValue {
                section: section.name().to_string(),
                key: key.to_string(),
                reason: format!("lower bound {} exceeds upper bound {}", lo, hi),
            });
        }
        ranges.push(Range {
            lo,
            hi,
            text: text.to_string(),
        });
    }
    ranges.sort_by(|a, b| a.lo.total_cmp(&b.lo));
    Ok(ranges)
}

#[derive(Debug)]
pub struct SelectiveFeedbackHandler {
    ranges: Vec<Range>,
    text: String,
    outcomes: Outcomes,
}

impl SelectiveFeedbackHandler {
    fn from_section(section: &Section) -> Result<Self, StageError> {
        Ok(Self {
            ranges: parse_ranges(section)?,
            text: String::new(),
            outcomes: Outcomes::new(),
        })
    }

    /// Text of the first range containing `score`.
    pub fn select(&self, score: f64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|range| range.lo <= score && score <= range.hi)
            .map(|range| range.text.as_str())
    }

    fn feedback(&self) -> Option<(String, String)> {
        if self.text.trim().is_empty() {
            None
        } else {
            Some((SELECTIVE_FIELD.to_string(), self.text.clone()))
        }
    }
}

impl Handler for SelectiveFeedbackHandler {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::EditText
    }

    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        self.text = match ctx.existing_feedback.get(SELECTIVE_FIELD) {
            Some(existing) => existing.to_string(),
            None => self.select(ctx.score).unwrap_or_default().to_string(),
        };
        tracing::debug!(
            stage_id = %ctx.stage_id,
            score = ctx.score,
            selected = !self.text.is_empty(),
            "Selected feedback"
        );
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn output(&self) -> StageOutput {
        StageOutput::EditText {
            field_id: SELECTIVE_FIELD.to_string(),
            text: self.text.clone(),
            skip_empty: true,
        }
    }

    fn run(&mut self, _ctx: &StageContext) -> Option<StageResult> {
        let mut result = StageResult::pass_nonfinal().with_output(self.output());
        if let Some((id, text)) = self.feedback() {
            result = result.with_feedback(id, text);
        }
        Some(result)
    }

    fn on_input(
        &mut self,
        ctx: &StageContext,
        input: HandlerInput,
    ) -> Result<InputUpdate, StageError> {
        match input {
            HandlerInput::Text { field_id, text } if field_id == SELECTIVE_FIELD => {
                self.text = text;
                let feedback = self.feedback();
                Ok(InputUpdate {
                    clear_feedback: feedback.is_none().then(|| field_id.clone()),
                    feedback,
                    complete: true,
                    ..InputUpdate::default()
                })
            }
            _ => Err(StageError::NotInteractive(ctx.stage_id.clone())),
        }
    }
}

pub struct SelectiveFeedbackHandlerFactory;

impl HandlerFactory for SelectiveFeedbackHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "selective_feedback"
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(SelectiveFeedbackHandler::from_section(
            &ctx.config.section,
        )?))
    }

    fn validate_config(&self, section: &Section) -> Result<(), StageError> {
        parse_ranges(section)?;
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Picks editable feedback by the score reached so far"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use std::sync::Arc;

    fn section() -> Section {
        Section::new("stage_summary")
            .with("label", "Summary")
            .with("handler", "selective_feedback")
            .with("selective_5_10", "Excellent work.")
            .with("selective_0_4.5", "Needs improvement.")
    }

    fn ctx(score: f64) -> StageContext {
        let mut ctx = StageContext::new(Arc::new(StageConfig {
            stage_id: "summary".to_string(),
            label: "Summary".to_string(),
            handler: "selective_feedback".to_string(),
            score: Default::default(),
            mark: Default::default(),
            feedback_pre: None,
            feedback_post: None,
            halt_on_error: false,
            section: section(),
        }));
        ctx.score = score;
        ctx
    }

    #[test]
    fn test_ranges_sorted_and_selected() {
        let handler = SelectiveFeedbackHandler::from_section(&section()).unwrap();
        assert_eq!(handler.select(2.0), Some("Needs improvement."));
        assert_eq!(handler.select(5.0), Some("Excellent work."));
        assert_eq!(handler.select(4.75), None);
        assert_eq!(handler.select(11.0), None);
    }

    #[test]
    fn test_run_reports_selected_feedback() {
        let ctx = ctx(7.0);
        let mut handler = SelectiveFeedbackHandlerFactory.create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();
        let result = handler.run(&ctx).unwrap();
        assert_eq!(result.kind, crate::stage::ResultKind::PassNonfinal);
        assert_eq!(
            result.feedback,
            vec![(SELECTIVE_FIELD.to_string(), "Excellent work.".to_string())]
        );
    }

    #[test]
    fn test_existing_feedback_wins() {
        let mut ctx = ctx(7.0);
        ctx.existing_feedback.set(SELECTIVE_FIELD, "Edited earlier.");
        let mut handler = SelectiveFeedbackHandlerFactory.create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();
        assert!(matches!(
            handler.output(),
            StageOutput::EditText { ref text, .. } if text == "Edited earlier."
        ));
    }

    #[test]
    fn test_no_range_gives_no_feedback() {
        let ctx = ctx(20.0);
        let mut handler = SelectiveFeedbackHandlerFactory.create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();
        assert!(handler.run(&ctx).unwrap().feedback.is_empty());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let bad = Section::new("stage_summary").with("selective_9_1", "x");
        assert!(SelectiveFeedbackHandlerFactory.validate_config(&bad).is_err());
    }
}
