//! External process stages.
//!
//! Runs `command` with `args` and maps the exit status to a result through
//! a [`ProcessResponder`]. Section keys:
//! - `command` (required), `args` (list), `cwd`
//! - `run`: `once` (reuse a stored outcome) or `every_entry` (default)
//! - `score_pass` / `score_fail`: values of the two exit outcomes

use super::{Handler, HandlerFactory, HandlerVariant, StageContext};
use crate::config::Section;
use crate::model::{Outcome, Outcomes, ScaleOption};
use crate::stage::{StageError, StageOutput, StageResult};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

/// Outcome id of the exit status scale.
pub const EXIT_OUTCOME: &str = "exit_status";

const KEY_PASSED: usize = 0;
const KEY_FAILED: usize = 1;

/// When to execute the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPolicy {
    /// Skip execution if the submission already has an exit outcome
    Once,
    #[default]
    EveryEntry,
}

impl RunPolicy {
    fn parse(section: &Section) -> Result<Self, StageError> {
        match section.get("run").map(str::trim) {
            None | Some("every_entry") => Ok(RunPolicy::EveryEntry),
            Some("once") => Ok(RunPolicy::Once),
            Some(other) => Err(StageError::Config(crate::config::ConfigError::InvalidValue {
                section: section.name().to_string(),
                key: "run".to_string(),
                reason: format!("'{}' is not one of once, every_entry", other),
            })),
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// Exit code; `None` if terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Maps a finished process to a stage result.
pub trait ProcessResponder: Send + Sync {
    /// `exit` is the declared exit-status outcome with no key selected.
    fn response(&self, output: &ProcessOutput, exit: Outcome) -> StageResult;
}

/// Exit 0 passes; anything else fails with stderr as the error text.
#[derive(Debug, Default)]
pub struct ExitCodeResponder;

impl ProcessResponder for ExitCodeResponder {
    fn response(&self, output: &ProcessOutput, exit: Outcome) -> StageResult {
        let text = StageOutput::Text {
            text: output.stdout.clone(),
        };
        let key = if output.success() { KEY_PASSED } else { KEY_FAILED };
        let outcome = match exit.clone().with_key(key) {
            Ok(outcome) => outcome,
            Err(_) => exit,
        };

        if output.success() {
            StageResult::pass().with_outcome(outcome).with_output(text)
        } else {
            let error = if output.stderr.trim().is_empty() {
                match output.status {
                    Some(code) => format!("Process exited with status {}", code),
                    None => "Process terminated by signal".to_string(),
                }
            } else {
                output.stderr.trim().to_string()
            };
            StageResult::fail(error).with_outcome(outcome).with_output(text)
        }
    }
}

pub struct ProcessHandler {
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    policy: RunPolicy,
    responder: Arc<dyn ProcessResponder>,
    outcomes: Outcomes,
    last_output: Option<ProcessOutput>,
}

impl ProcessHandler {
    fn from_section(
        section: &Section,
        responder: Arc<dyn ProcessResponder>,
    ) -> Result<Self, StageError> {
        Ok(Self {
            command: section.require("command")?.to_string(),
            args: section.get_list("args")?.unwrap_or_default(),
            cwd: section.get("cwd").map(PathBuf::from),
            policy: RunPolicy::parse(section)?,
            responder,
            outcomes: Outcomes::new(),
            last_output: None,
        })
    }

    pub fn policy(&self) -> RunPolicy {
        self.policy
    }

    fn exit_outcome(&self) -> Option<Outcome> {
        self.outcomes.get(EXIT_OUTCOME).cloned()
    }

    fn execute(&self, ctx: &StageContext) -> Result<ProcessOutput, std::io::Error> {
        let mut command = Command::new(&self.command);
        command.args(&self.args);

        let cwd = self
            .cwd
            .clone()
            .or_else(|| ctx.submission_dir().filter(|dir| dir.is_dir()));
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        command
            .env("FEEDBACKER_STAGE", &ctx.stage_id)
            .env("FEEDBACKER_DIR_TEMP", &ctx.dir_temp)
            .env("FEEDBACKER_DIR_SUBMISSIONS", &ctx.dir_submissions);
        if let Some(submission) = &ctx.submission {
            command.env("FEEDBACKER_SUBMISSION", submission);
        }

        let output = command.output()?;
        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Handler for ProcessHandler {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::Process
    }

    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        let section = &ctx.config.section;
        let pass = section
            .get_f64("score_pass")?
            .or(ctx.config.score.max)
            .unwrap_or(1.0);
        let fail = section
            .get_f64("score_fail")?
            .or(ctx.config.score.min)
            .unwrap_or(0.0);

        let exit = Outcome::scale(
            EXIT_OUTCOME,
            vec![ScaleOption::new("passed", pass), ScaleOption::new("failed", fail)],
        )
        .with_explanation(format!("Exit status of {}", self.command));

        self.outcomes = Outcomes::new();
        self.outcomes.set(EXIT_OUTCOME, exit);
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn output(&self) -> StageOutput {
        match &self.last_output {
            Some(output) => StageOutput::Text {
                text: output.stdout.clone(),
            },
            None => StageOutput::None,
        }
    }

    fn run(&mut self, ctx: &StageContext) -> Option<StageResult> {
        let exit = self.exit_outcome()?;

        if self.policy == RunPolicy::Once {
            if let Some(previous) = ctx.existing_outcomes.get(EXIT_OUTCOME) {
                tracing::debug!(stage = %ctx.stage_id, "Process already run; reusing stored outcome");
                let result = match previous.key {
                    Some(KEY_PASSED) => StageResult::pass(),
                    _ => StageResult::fail("Process failed on a previous run"),
                };
                return Some(result.with_outcome(previous.clone()));
            }
        }

        match self.execute(ctx) {
            Ok(output) => {
                let result = self.responder.response(&output, exit);
                self.last_output = Some(output);
                Some(result)
            }
            Err(e) => Some(StageResult::critical(format!(
                "Failed to run {}: {}",
                self.command, e
            ))),
        }
    }
}

/// Builds process handlers with a shared responder.
pub struct ProcessHandlerFactory {
    handler_type: &'static str,
    responder: Arc<dyn ProcessResponder>,
}

impl ProcessHandlerFactory {
    /// Register under another type name with a custom responder.
    pub fn named(handler_type: &'static str, responder: Arc<dyn ProcessResponder>) -> Self {
        Self {
            handler_type,
            responder,
        }
    }
}

impl Default for ProcessHandlerFactory {
    fn default() -> Self {
        Self::named("process", Arc::new(ExitCodeResponder))
    }
}

impl HandlerFactory for ProcessHandlerFactory {
    fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(ProcessHandler::from_section(
            &ctx.config.section,
            self.responder.clone(),
        )?))
    }

    fn validate_config(&self, section: &Section) -> Result<(), StageError> {
        section.require("command")?;
        section.get_list("args")?;
        section.get_f64("score_pass")?;
        section.get_f64("score_fail")?;
        RunPolicy::parse(section)?;
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Runs an external command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::model::Bounds;

    fn ctx(section: Section) -> StageContext {
        StageContext::new(Arc::new(StageConfig {
            stage_id: "tests".to_string(),
            label: "Tests".to_string(),
            handler: "process".to_string(),
            score: Bounds::new(Some(0.0), Some(5.0)),
            mark: Bounds::UNBOUNDED,
            feedback_pre: None,
            feedback_post: None,
            halt_on_error: false,
            section,
        }))
    }

    fn shell(script: &str) -> Section {
        Section::new("stage_tests")
            .with("command", "sh")
            .with("args", serde_json::json!(["-c", script]).to_string())
    }

    fn run(section: Section) -> StageResult {
        let ctx = ctx(section);
        let mut handler = ProcessHandlerFactory::default().create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();
        handler.run(&ctx).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_zero_passes_with_score() {
        let result = run(shell("echo all good"));
        assert_eq!(result.kind, crate::stage::ResultKind::Pass);
        let outcome = result.outcome.unwrap();
        assert_eq!(outcome.key, Some(KEY_PASSED));
        assert_eq!(outcome.value, Some(5.0));
        assert!(matches!(result.output, Some(StageOutput::Text { ref text }) if text.trim() == "all good"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_fails_with_stderr() {
        let result = run(shell("echo broken >&2; exit 3"));
        assert_eq!(result.kind, crate::stage::ResultKind::Fail);
        assert_eq!(result.error_text(), Some("broken"));
        assert_eq!(result.outcome.unwrap().value, Some(0.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_submission_env_is_exported() {
        let section = shell("test \"$FEEDBACKER_SUBMISSION\" = s42");
        let ctx = ctx(section).with_submission("s42");
        let mut handler = ProcessHandlerFactory::default().create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();
        assert_eq!(handler.run(&ctx).unwrap().kind, crate::stage::ResultKind::Pass);
    }

    #[test]
    fn test_missing_command_is_critical() {
        let section = Section::new("stage_tests").with("command", "feedbacker-no-such-binary");
        let result = run(section);
        assert_eq!(result.kind, crate::stage::ResultKind::Critical);
        assert!(result.error_text().unwrap().contains("Failed to run"));
    }

    #[test]
    fn test_run_once_reuses_stored_outcome() {
        let section = Section::new("stage_tests")
            .with("command", "feedbacker-no-such-binary")
            .with("run", "once");
        let mut ctx = ctx(section);
        let mut handler = ProcessHandlerFactory::default().create(&ctx).unwrap();
        handler.calculate_outcomes(&ctx).unwrap();

        let stored = handler
            .outcomes()
            .get(EXIT_OUTCOME)
            .cloned()
            .unwrap()
            .with_key(KEY_PASSED)
            .unwrap();
        ctx.existing_outcomes.set(EXIT_OUTCOME, stored);

        let result = handler.run(&ctx).unwrap();
        assert_eq!(result.kind, crate::stage::ResultKind::Pass);
    }

    #[test]
    fn test_validate_rejects_unknown_policy() {
        let section = Section::new("stage_tests")
            .with("command", "true")
            .with("run", "sometimes");
        assert!(ProcessHandlerFactory::default().validate_config(&section).is_err());
        assert!(ProcessHandlerFactory::default()
            .validate_config(&Section::new("stage_tests"))
            .is_err());
    }
}
