//! Scripted answers for headless scoring.
//!
//! The answers file maps stage ids to question numbers (form stages) or
//! field ids (editable text stages):
//!
//! ```yaml
//! style:
//!   "1": Good          # scale option, by label or by index
//!   "2": Tidy layout.  # free feedback
//!   "3": 2.5           # typed score
//!   "4": ~             # clear a scale answer
//! comments:
//!   text: Well done.
//! ```

use anyhow::{anyhow, bail, Context, Result};
use feedbacker_core::form::QuestionKind;
use feedbacker_core::{FormAnswer, FormDefinition, HandlerInput, StageConfig};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

const FORM_HANDLER: &str = "form";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Answers {
    stages: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Answers {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document means no answers
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read answers from {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid answers file {:?}", path))
    }

    pub fn has_stage(&self, stage_id: &str) -> bool {
        self.stages.contains_key(stage_id)
    }

    /// Every scripted input for one stage, in key order.
    pub fn inputs(&self, stage: &StageConfig) -> Result<Vec<HandlerInput>> {
        let Some(answers) = self.stages.get(&stage.stage_id) else {
            return Ok(Vec::new());
        };

        if stage.handler != FORM_HANDLER {
            return answers
                .iter()
                .map(|(field_id, value)| {
                    Ok(HandlerInput::Text {
                        field_id: field_id.clone(),
                        text: scalar_text(value)
                            .ok_or_else(|| anyhow!("Answer for field '{}' must be text", field_id))?,
                    })
                })
                .collect();
        }

        let form = FormDefinition::from_section(&stage.stage_id, &stage.section)?;
        answers
            .iter()
            .map(|(num, value)| {
                let question = form
                    .question(num)
                    .ok_or_else(|| anyhow!("Stage '{}' has no question {}", stage.stage_id, num))?;
                let answer = form_answer(&question.kind, value)
                    .with_context(|| format!("Invalid answer to question {} of stage '{}'", num, stage.stage_id))?;
                Ok(HandlerInput::Form {
                    question: num.clone(),
                    answer,
                })
            })
            .collect()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn form_answer(kind: &QuestionKind, value: &Value) -> Result<FormAnswer> {
    match kind {
        QuestionKind::Scale { options, .. } => match value {
            Value::Null => Ok(FormAnswer::Clear),
            Value::Number(n) => {
                let index = n
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| anyhow!("'{}' is not an option index", n))?;
                Ok(FormAnswer::Select(index))
            }
            Value::String(label) => options
                .iter()
                .position(|option| option.eq_ignore_ascii_case(label.trim()))
                .map(FormAnswer::Select)
                .ok_or_else(|| anyhow!("'{}' is not one of {:?}", label, options)),
            _ => bail!("expected an option label or index"),
        },
        QuestionKind::InputScore { .. } => scalar_text(value)
            .map(FormAnswer::Score)
            .ok_or_else(|| anyhow!("expected a number")),
        QuestionKind::InputFeedback => scalar_text(value)
            .map(FormAnswer::Text)
            .ok_or_else(|| anyhow!("expected text")),
    }
}
