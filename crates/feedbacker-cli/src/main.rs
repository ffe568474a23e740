//! Feedbacker CLI
//!
//! Command-line front end for staged scoring and marking of submissions.
//!
//! ## Usage
//!
//! ```bash
//! # Score one submission, answering forms from a file
//! feedbacker --config assessment.yaml score student42 --answers student42.yaml
//!
//! # Score again from scratch
//! feedbacker --config assessment.yaml score student42 --restart
//!
//! # Adjust marks and write the final feedback documents
//! feedbacker --config assessment.yaml mark --set style:1:2=3.5 --finalize
//!
//! # Forget a submission
//! feedbacker --config assessment.yaml delete student42
//!
//! # Check a configuration
//! feedbacker --config assessment.yaml config validate
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: A stage failed
//! - 2: Configuration error
//! - 3: Error

mod answers;
mod console;
mod store;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use answers::Answers;
use console::ConsoleView;
use feedbacker_core::report::format_number;
use feedbacker_core::{
    Config, ConfigError, FeedbackerError, HandlerRegistry, StageRegistry, StageResult, StageState,
};
use feedbacker_runtime::{Deleter, Marker, Scorer, StageController};
use store::FileStore;

/// Feedbacker: staged scoring, marking and feedback for submissions
#[derive(Parser)]
#[command(name = "feedbacker")]
#[command(version)]
#[command(about = "Score, mark and give feedback on student submissions", long_about = None)]
struct Cli {
    /// Path to the assessment configuration (YAML or JSON)
    #[arg(short, long, global = true, default_value = "feedbacker.yaml")]
    config: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage for one submission
    Score {
        /// Submission id (its directory name under dir_submissions)
        submission: String,

        /// YAML file with form and text answers
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// Discard existing results of the submission first
        #[arg(long)]
        restart: bool,
    },

    /// Seed and adjust marks across all submissions
    Mark {
        /// Override a mark: stage:outcome[:key]=mark (can be specified multiple times)
        #[arg(long = "set")]
        overrides: Vec<MarkOverride>,

        /// Write the final feedback document of every submission
        #[arg(long)]
        finalize: bool,
    },

    /// Remove a submission's results
    Delete {
        submission: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the configuration and list its stages
    Validate,
}

/// A mark given on the command line.
#[derive(Debug, Clone, PartialEq)]
struct MarkOverride {
    stage_id: String,
    outcome_id: String,
    key: Option<usize>,
    mark: f64,
}

impl FromStr for MarkOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let usage = || format!("Invalid mark '{}'. Expected stage:outcome[:key]=mark", s);
        let (target, mark) = s.split_once('=').ok_or_else(usage)?;
        let mark = mark.trim().parse::<f64>().map_err(|_| usage())?;

        let parts: Vec<&str> = target.split(':').map(str::trim).collect();
        let (stage_id, outcome_id, key) = match parts.as_slice() {
            [stage, outcome] => (stage, outcome, None),
            [stage, outcome, key] => (stage, outcome, Some(key.parse::<usize>().map_err(|_| usage())?)),
            _ => return Err(usage()),
        };
        if stage_id.is_empty() || outcome_id.is_empty() {
            return Err(usage());
        }

        Ok(Self {
            stage_id: stage_id.to_string(),
            outcome_id: outcome_id.to_string(),
            key,
            mark,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match run(cli) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if is_config_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::from(3)
            }
        }
    }
}

fn is_config_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || cause
                .downcast_ref::<FeedbackerError>()
                .is_some_and(FeedbackerError::is_config)
    })
}

fn run(cli: Cli) -> Result<ExitCode> {
    let handlers = HandlerRegistry::with_defaults();

    match cli.command {
        Commands::Config {
            action: ConfigAction::Validate,
        } => validate_config(&cli.config, &handlers),
        Commands::Score {
            submission,
            answers,
            restart,
        } => {
            let config = load_config(&cli.config)?;
            score_command(config, &handlers, &submission, answers, restart)
        }
        Commands::Mark {
            overrides,
            finalize,
        } => {
            let config = load_config(&cli.config)?;
            mark_command(config, &handlers, &overrides, finalize)
        }
        Commands::Delete { submission } => {
            let config = load_config(&cli.config)?;
            delete_command(&FileStore::new(&config), &submission)
        }
    }
}

fn load_config(path: &Path) -> Result<Arc<Config>> {
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    Ok(Arc::new(config))
}

fn validate_config(path: &Path, handlers: &HandlerRegistry) -> Result<ExitCode> {
    let config = match Config::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration is invalid: {}", e);
            return Ok(ExitCode::from(2));
        }
    };
    let stages = match StageRegistry::build(&config, handlers) {
        Ok(stages) => stages,
        Err(e) => {
            eprintln!("Configuration is invalid: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    println!("Configuration is valid: {}", config.app.name);
    println!();

    let mut unresolved = 0;
    for stage in stages.iter() {
        match stage.resolution_error() {
            None => {
                let description = handlers
                    .get_factory(stage.handler_type())
                    .map(|factory| factory.description())
                    .unwrap_or_default();
                println!(
                    "  {}: {} ({}) {}",
                    stage.stage_id,
                    stage.label,
                    stage.handler_type(),
                    description
                );
            }
            Some(reason) => {
                unresolved += 1;
                println!("  {}: {} ({}) UNRESOLVED: {}", stage.stage_id, stage.label, stage.handler_type(), reason);
            }
        }
    }

    Ok(if unresolved == 0 {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn score_command(
    config: Arc<Config>,
    handlers: &HandlerRegistry,
    submission: &str,
    answers: Option<PathBuf>,
    restart: bool,
) -> Result<ExitCode> {
    let store = FileStore::new(&config);
    let answers = match answers {
        Some(path) => Answers::from_file(&path)?,
        None => Answers::default(),
    };

    let view = ConsoleView::new();
    let session = view.session();
    let mut scorer = Scorer::new(config.clone(), handlers, store.load(), Box::new(view), submission)
        .map_err(FeedbackerError::from)
        .context("Failed to set up the scorer")?;

    if scorer.has_existing_results() {
        if restart {
            scorer.reset_submission();
        } else {
            tracing::info!(submission = %submission, "Updating existing results");
        }
    }

    scorer.execute_first_stage()?;
    scorer.wait_for_workers()?;

    let mut answered: Vec<String> = Vec::new();
    loop {
        let entered: Vec<String> = scorer
            .engine()
            .stages()
            .iter()
            .filter(|d| matches!(d.state, StageState::Active | StageState::Complete))
            .map(|d| d.stage_id.clone())
            .filter(|id| answers.has_stage(id) && !answered.contains(id))
            .collect();
        for stage_id in entered {
            let stage = config
                .stage(&stage_id)
                .ok_or_else(|| anyhow!("Unknown stage '{}'", stage_id))?;
            for input in answers.inputs(stage)? {
                scorer
                    .answer(&stage_id, input)
                    .with_context(|| format!("Failed to answer stage '{}'", stage_id))?;
            }
            answered.push(stage_id);
        }

        // A form with nothing left to answer is done
        if let Some(current) = scorer.engine().current_stage().map(str::to_string) {
            let outstanding = session.lock().outstanding(&current).map(<[String]>::is_empty);
            if scorer.stage_state(&current) == Some(StageState::Active) && outstanding == Some(true) {
                scorer.report(StageResult::pass_nonfinal(), Some(&current))?;
            }
        }
        scorer.wait_for_workers()?;

        match scorer.next_stage_id().map(str::to_string) {
            Some(next) => {
                scorer.select_stage(&next)?;
                scorer.wait_for_workers()?;
            }
            None => break,
        }
    }

    let failed = failed_stages(scorer.engine().stages());
    let waiting: Vec<String> = scorer
        .engine()
        .stages()
        .iter()
        .filter(|d| d.state == StageState::Active)
        .map(|d| d.label.clone())
        .collect();
    let score = scorer.score();
    let model = scorer.into_model();

    store.save_model(&model)?;
    store.write_scores(&config, &model)?;
    if config.assessment.scores_are_marks {
        store.write_marks(&config, &model)?;
        store.write_final_feedback(&config, &model, submission)?;
    }

    println!();
    for label in &waiting {
        println!("Waiting for answers: {}", label);
    }
    println!("Score for {}: {}", submission, format_number(score));

    let halted = session.lock().halted();
    Ok(exit_code(&failed, halted))
}

fn mark_command(
    config: Arc<Config>,
    handlers: &HandlerRegistry,
    overrides: &[MarkOverride],
    finalize: bool,
) -> Result<ExitCode> {
    let store = FileStore::new(&config);
    let view = ConsoleView::new();
    let session = view.session();
    let mut marker = Marker::new(config.clone(), handlers, store.load(), Box::new(view))
        .map_err(FeedbackerError::from)
        .context("Failed to set up the marker")?;

    marker.open_all()?;
    for o in overrides {
        marker
            .set_mark(&o.stage_id, &o.outcome_id, o.key, o.mark)
            .with_context(|| format!("Failed to set mark for {}:{}", o.stage_id, o.outcome_id))?;
    }

    let failed = failed_stages(marker.engine().stages());
    let marks = marker.submission_marks();
    let model = marker.into_model();

    store.save_model(&model)?;
    store.write_marks(&config, &model)?;
    if finalize || config.assessment.scores_are_marks {
        for (submission, _) in &marks {
            store.write_final_feedback(&config, &model, submission)?;
        }
    }

    println!();
    for (submission, mark) in &marks {
        println!("{}: {}", submission, format_number(*mark));
    }

    let halted = session.lock().halted();
    Ok(exit_code(&failed, halted))
}

fn delete_command(store: &FileStore, submission: &str) -> Result<ExitCode> {
    let mut deleter = Deleter::new(store.load());
    if deleter.delete(submission) {
        store.save_model(deleter.model())?;
        println!("Deleted results of {}", submission);
    } else {
        println!("No results stored for {}", submission);
    }
    Ok(ExitCode::from(0))
}

fn failed_stages(stages: &StageRegistry) -> Vec<String> {
    stages
        .iter()
        .filter(|d| d.state == StageState::Failed)
        .map(|d| d.label.clone())
        .collect()
}

fn exit_code(failed: &[String], halted: bool) -> ExitCode {
    if failed.is_empty() && !halted {
        return ExitCode::from(0);
    }
    for label in failed {
        eprintln!("Stage failed: {}", label);
    }
    ExitCode::from(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_config(dir: &Path) -> Arc<Config> {
        let yaml = format!(
            r#"
app:
  name: CS101
  dir_output: "{}"
assessment:
  stages: [intro, style]
  score_min: 0
  score_max: 10
stage_intro:
  label: Intro
  handler: none
  feedback_pre: "Feedback for ##submission##."
stage_style:
  label: Style
  handler: form
  question1: Layout
  type1: scale
  required1: true
  answer1: '["Poor", "Good", "Great"]'
  score1: "0, 5, 12"
"#,
            dir.display()
        );
        Arc::new(Config::from_yaml(&yaml).unwrap())
    }

    #[test]
    fn test_parse_mark_override() {
        assert_eq!(
            "style:1=2.5".parse::<MarkOverride>().unwrap(),
            MarkOverride {
                stage_id: "style".to_string(),
                outcome_id: "1".to_string(),
                key: None,
                mark: 2.5,
            }
        );
        assert_eq!(
            "style:1:2=3".parse::<MarkOverride>().unwrap().key,
            Some(2)
        );
    }

    #[test]
    fn test_parse_mark_override_rejects_garbage() {
        assert!("style=2".parse::<MarkOverride>().is_err());
        assert!("style:1".parse::<MarkOverride>().is_err());
        assert!("style:1:x=2".parse::<MarkOverride>().is_err());
        assert!(":1=2".parse::<MarkOverride>().is_err());
        assert!("style:1=lots".parse::<MarkOverride>().is_err());
    }

    #[test]
    fn test_config_errors_are_classified() {
        let error = Config::from_yaml("assessment: {}").unwrap_err();
        let error = anyhow::Error::new(error).context("Failed to load configuration");
        assert!(is_config_error(&error));

        let error = anyhow!("disk full");
        assert!(!is_config_error(&error));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "feedbacker",
            "--config",
            "a.yaml",
            "mark",
            "--set",
            "style:1:0=1",
            "--set",
            "tests:exit_status=2",
            "--finalize",
        ])
        .unwrap();
        match cli.command {
            Commands::Mark {
                overrides,
                finalize,
            } => {
                assert_eq!(overrides.len(), 2);
                assert!(finalize);
            }
            _ => panic!("expected mark"),
        }
        assert_eq!(cli.config, PathBuf::from("a.yaml"));
    }

    #[test]
    fn test_score_then_mark_then_delete() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(dir.path());
        let handlers = HandlerRegistry::with_defaults();
        let answers = dir.path().join("answers.yaml");
        std::fs::write(&answers, "style:\n  \"1\": Great\n").unwrap();

        let code = score_command(config.clone(), &handlers, "alice", Some(answers), false).unwrap();
        assert_eq!(code, ExitCode::from(0));

        let store = FileStore::new(&config);
        let model = store.load();
        assert_eq!(model.score("alice", &config.score_bounds()), 10.0);
        let scores = std::fs::read_to_string(store.path("scores.csv")).unwrap();
        assert!(scores.ends_with("alice,12.0,10.0\n"));

        let overrides = vec!["style:1:2=4".parse::<MarkOverride>().unwrap()];
        let code = mark_command(config.clone(), &handlers, &overrides, true).unwrap();
        assert_eq!(code, ExitCode::from(0));
        let marks = std::fs::read_to_string(store.path("marks.csv")).unwrap();
        assert!(marks.ends_with("alice,4.0,4.0\n"));
        let feedback = std::fs::read_to_string(store.path("feedback_alice.txt")).unwrap();
        assert!(feedback.starts_with("Feedback for alice."));

        delete_command(&store, "alice").unwrap();
        assert!(!store.load().has_submission("alice"));
    }

    #[test]
    fn test_validate_config_codes() {
        let dir = TempDir::new().unwrap();
        let handlers = HandlerRegistry::with_defaults();

        let valid = dir.path().join("valid.yaml");
        std::fs::write(
            &valid,
            "assessment:\n  stages: [intro]\nstage_intro:\n  label: Intro\n  handler: none\n",
        )
        .unwrap();
        assert_eq!(validate_config(&valid, &handlers).unwrap(), ExitCode::from(0));

        let unresolved = dir.path().join("unresolved.yaml");
        std::fs::write(
            &unresolved,
            "assessment:\n  stages: [intro]\nstage_intro:\n  label: Intro\n  handler: teleport\n",
        )
        .unwrap();
        assert_eq!(validate_config(&unresolved, &handlers).unwrap(), ExitCode::from(2));
    }

    #[test]
    fn test_keyless_scale_override_fails() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(dir.path());
        let handlers = HandlerRegistry::with_defaults();
        let answers = dir.path().join("answers.yaml");
        std::fs::write(&answers, "style:\n  \"1\": Good\n").unwrap();
        score_command(config.clone(), &handlers, "alice", Some(answers), false).unwrap();

        let overrides = vec!["style:1=4".parse::<MarkOverride>().unwrap()];
        assert!(mark_command(config.clone(), &handlers, &overrides, false).is_err());

        let model = FileStore::new(&config).load();
        assert!(model.marks.stage("style").is_none());
    }

    #[test]
    fn test_unanswered_form_waits() {
        let dir = TempDir::new().unwrap();
        let config = scratch_config(dir.path());
        let handlers = HandlerRegistry::with_defaults();

        let code = score_command(config.clone(), &handlers, "bob", None, false).unwrap();
        assert_eq!(code, ExitCode::from(0));

        let model = FileStore::new(&config).load();
        assert!(model.outcomes.submission("bob").map_or(true, |s| s.stage("style").is_none()));
        assert!(model.has_submission("bob"));
    }
}
