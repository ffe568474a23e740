//! Static and editable text stages.
//!
//! `text` shows the section's `text` key read-only. `edit_text` shows it
//! editable; each edit becomes the stage's feedback fragment.

use super::{Handler, HandlerFactory, HandlerInput, HandlerVariant, InputUpdate, StageContext};
use crate::config::Section;
use crate::model::Outcomes;
use crate::stage::{StageError, StageOutput, StageResult};

/// Feedback id used for edited text.
pub const TEXT_FIELD: &str = "text";

#[derive(Debug)]
pub struct TextHandler {
    text: String,
    editable: bool,
    skip_empty: bool,
    outcomes: Outcomes,
}

impl TextHandler {
    pub fn read_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            editable: false,
            skip_empty: false,
            outcomes: Outcomes::new(),
        }
    }

    pub fn editable(text: impl Into<String>, skip_empty: bool) -> Self {
        Self {
            editable: true,
            skip_empty,
            ..Self::read_only(text)
        }
    }

    fn from_section(section: &Section, editable: bool) -> Result<Self, StageError> {
        let text = section.get("text").unwrap_or_default();
        if editable {
            let skip_empty = section.get_bool("skip_empty")?.unwrap_or(false);
            Ok(Self::editable(text, skip_empty))
        } else {
            Ok(Self::read_only(text))
        }
    }
}

impl Handler for TextHandler {
    fn variant(&self) -> HandlerVariant {
        if self.editable {
            HandlerVariant::EditText
        } else {
            HandlerVariant::Text
        }
    }

    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        if self.editable {
            if let Some(existing) = ctx.existing_feedback.get(TEXT_FIELD) {
                self.text = existing.to_string();
            }
        }
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn output(&self) -> StageOutput {
        if self.editable {
            StageOutput::EditText {
                field_id: TEXT_FIELD.to_string(),
                text: self.text.clone(),
                skip_empty: self.skip_empty,
            }
        } else {
            StageOutput::Text {
                text: self.text.clone(),
            }
        }
    }

    fn run(&mut self, _ctx: &StageContext) -> Option<StageResult> {
        if self.editable {
            let mut result = StageResult::pass_nonfinal().with_output(self.output());
            if !(self.skip_empty && self.text.trim().is_empty()) {
                result = result.with_feedback(TEXT_FIELD, self.text.clone());
            }
            Some(result)
        } else {
            Some(StageResult::pass().with_output(self.output()))
        }
    }

    fn on_input(
        &mut self,
        ctx: &StageContext,
        input: HandlerInput,
    ) -> Result<InputUpdate, StageError> {
        match input {
            HandlerInput::Text { field_id, text } if self.editable && field_id == TEXT_FIELD => {
                self.text = text;
                let mut update = InputUpdate {
                    complete: true,
                    ..InputUpdate::default()
                };
                if self.skip_empty && self.text.trim().is_empty() {
                    update.clear_feedback = Some(field_id);
                } else {
                    update.feedback = Some((field_id, self.text.clone()));
                }
                Ok(update)
            }
            _ => Err(StageError::NotInteractive(ctx.stage_id.clone())),
        }
    }
}

pub struct TextHandlerFactory;

impl HandlerFactory for TextHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "text"
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(TextHandler::from_section(&ctx.config.section, false)?))
    }

    fn description(&self) -> &'static str {
        "Shows static text"
    }
}

pub struct EditTextHandlerFactory;

impl HandlerFactory for EditTextHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "edit_text"
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(TextHandler::from_section(&ctx.config.section, true)?))
    }

    fn validate_config(&self, section: &Section) -> Result<(), StageError> {
        section.get_bool("skip_empty")?;
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Shows editable text that becomes feedback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StageContext {
        StageContext::new(std::sync::Arc::new(crate::config::StageConfig {
            stage_id: "notes".to_string(),
            label: "Notes".to_string(),
            handler: "edit_text".to_string(),
            score: Default::default(),
            mark: Default::default(),
            feedback_pre: None,
            feedback_post: None,
            halt_on_error: false,
            section: Section::new("stage_notes"),
        }))
    }

    #[test]
    fn test_read_only_passes_with_text() {
        let mut handler = TextHandler::read_only("Instructions");
        assert_eq!(handler.variant(), HandlerVariant::Text);
        let result = handler.run(&ctx()).unwrap();
        assert!(matches!(result.output, Some(StageOutput::Text { ref text }) if text == "Instructions"));
        assert!(result.feedback.is_empty());
    }

    #[test]
    fn test_edit_becomes_feedback() {
        let mut handler = TextHandler::editable("", true);
        let update = handler
            .on_input(
                &ctx(),
                HandlerInput::Text {
                    field_id: TEXT_FIELD.to_string(),
                    text: "Well structured.".to_string(),
                },
            )
            .unwrap();
        assert_eq!(
            update.feedback,
            Some((TEXT_FIELD.to_string(), "Well structured.".to_string()))
        );

        let update = handler
            .on_input(
                &ctx(),
                HandlerInput::Text {
                    field_id: TEXT_FIELD.to_string(),
                    text: "  ".to_string(),
                },
            )
            .unwrap();
        assert_eq!(update.feedback, None);
        assert_eq!(update.clear_feedback.as_deref(), Some(TEXT_FIELD));
    }

    #[test]
    fn test_read_only_rejects_input() {
        let mut handler = TextHandler::read_only("x");
        let input = HandlerInput::Text {
            field_id: TEXT_FIELD.to_string(),
            text: "y".to_string(),
        };
        assert!(matches!(
            handler.on_input(&ctx(), input),
            Err(StageError::NotInteractive(_))
        ));
    }
}
