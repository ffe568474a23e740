//! Submission check: find the submission and stage it in the temp directory.

use super::{Handler, HandlerFactory, HandlerVariant, StageContext};
use crate::config::Section;
use crate::model::{Outcome, Outcomes, ScaleOption};
use crate::stage::{ChecklistItem, StageError, StageOutput, StageResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome id of the submitted/not submitted scale.
pub const SUBMISSION_OUTCOME: &str = "submission";

const KEY_NOSUBMISSION: usize = 0;
const KEY_SUBMITTED: usize = 1;

const STEP_FIND: usize = 0;
const STEP_COPY_SUBMISSION: usize = 1;
const STEP_COPY_FRAMEWORK: usize = 2;

#[derive(Debug)]
pub struct SubmissionCheckHandler {
    copy_to_temp: bool,
    framework_directory: Option<PathBuf>,
    checklist: Vec<ChecklistItem>,
    outcomes: Outcomes,
}

impl SubmissionCheckHandler {
    fn from_section(section: &Section) -> Result<Self, StageError> {
        Ok(Self {
            copy_to_temp: section.get_bool("copy_to_temp")?.unwrap_or(false),
            framework_directory: section.get("framework_directory").map(PathBuf::from),
            checklist: vec![
                ChecklistItem::pending("Find submission directory"),
                ChecklistItem::pending("Copy submission into temporary directory"),
                ChecklistItem::pending("Copy framework into temporary directory"),
            ],
            outcomes: Outcomes::new(),
        })
    }

    fn set_step(&mut self, step: usize, state: Option<bool>) {
        if let Some(item) = self.checklist.get_mut(step) {
            item.state = state;
        }
    }

    fn check(&mut self, ctx: &StageContext) -> Result<(), String> {
        let dir = ctx
            .submission_dir()
            .ok_or_else(|| "No submission selected".to_string())?;

        let mut entries = fs::read_dir(&dir)
            .map_err(|e| format!("Error reading submission: {} ({})", dir.display(), e))?;
        if entries.next().is_none() {
            self.set_step(STEP_FIND, Some(false));
            return Err(format!("Submission directory is empty: {}", dir.display()));
        }
        self.set_step(STEP_FIND, Some(true));

        if self.copy_to_temp {
            empty_directory(&ctx.dir_temp)?;
            copy_tree(&dir, &ctx.dir_temp)
                .map_err(|e| format!("Error copying submission: {}", e))?;
            self.set_step(STEP_COPY_SUBMISSION, Some(true));
        }

        if let Some(framework) = self.framework_directory.clone() {
            copy_tree(&framework, &ctx.dir_temp)
                .map_err(|e| format!("Error copying framework: {}", e))?;
            self.set_step(STEP_COPY_FRAMEWORK, Some(true));
        }

        Ok(())
    }
}

fn empty_directory(dir: &Path) -> Result<(), String> {
    if dir.is_dir() {
        fs::remove_dir_all(dir)
            .map_err(|e| format!("Could not empty directory: {} ({})", dir.display(), e))?;
    }
    fs::create_dir_all(dir)
        .map_err(|e| format!("Could not create directory: {} ({})", dir.display(), e))
}

/// Copy every file under `src` into `dst`, keeping relative paths.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), String> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| e.to_string())?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| format!("{}: {}", target.display(), e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| format!("{}: {}", entry.path().display(), e))?;
        }
    }
    Ok(())
}

impl Handler for SubmissionCheckHandler {
    fn variant(&self) -> HandlerVariant {
        HandlerVariant::Custom
    }

    fn calculate_outcomes(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        let outcome = Outcome::scale(
            SUBMISSION_OUTCOME,
            vec![
                ScaleOption::new("nosubmission", ctx.config.score.min.unwrap_or(0.0)),
                ScaleOption::new("submitted", ctx.config.score.max.unwrap_or(1.0)),
            ],
        )
        .with_explanation("Whether the student made a submission");

        self.outcomes = Outcomes::new();
        self.outcomes.set(SUBMISSION_OUTCOME, outcome);
        Ok(())
    }

    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn output(&self) -> StageOutput {
        StageOutput::Checklist {
            items: self.checklist.clone(),
        }
    }

    fn run(&mut self, ctx: &StageContext) -> Option<StageResult> {
        let declared = self.outcomes.get(SUBMISSION_OUTCOME)?.clone();

        let (result, key) = match self.check(ctx) {
            Ok(()) => (StageResult::pass(), KEY_SUBMITTED),
            Err(error) => (StageResult::critical(error), KEY_NOSUBMISSION),
        };

        let result = result.with_output(self.output());
        Some(match declared.with_key(key) {
            Ok(outcome) => result.with_outcome(outcome),
            Err(_) => result,
        })
    }
}

pub struct SubmissionCheckHandlerFactory;

impl HandlerFactory for SubmissionCheckHandlerFactory {
    fn handler_type(&self) -> &'static str {
        "submission_check"
    }

    fn create(&self, ctx: &StageContext) -> Result<Box<dyn Handler>, StageError> {
        Ok(Box::new(SubmissionCheckHandler::from_section(&ctx.config.section)?))
    }

    fn validate_config(&self, section: &Section) -> Result<(), StageError> {
        section.get_bool("copy_to_temp")?;
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Checks a submission exists and stages it in the temp directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::model::Bounds;
    use crate::stage::ResultKind;
    use std::sync::Arc;

    fn ctx(root: &Path, section: Section) -> StageContext {
        StageContext::new(Arc::new(StageConfig {
            stage_id: "init".to_string(),
            label: "Init".to_string(),
            handler: "submission_check".to_string(),
            score: Bounds::new(Some(0.0), Some(2.0)),
            mark: Bounds::UNBOUNDED,
            feedback_pre: None,
            feedback_post: None,
            halt_on_error: true,
            section,
        }))
        .with_dirs(root.join("temp"), root.join("submissions"))
    }

    fn run(ctx: &StageContext) -> StageResult {
        let mut handler = SubmissionCheckHandlerFactory.create(ctx).unwrap();
        handler.calculate_outcomes(ctx).unwrap();
        handler.run(ctx).unwrap()
    }

    #[test]
    fn test_present_submission_passes() {
        let root = tempfile::tempdir().unwrap();
        let sub = root.path().join("submissions").join("s1");
        fs::create_dir_all(sub.join("src")).unwrap();
        fs::write(sub.join("src").join("main.py"), "print(1)").unwrap();

        let section = Section::new("stage_init").with("copy_to_temp", "true");
        let ctx = ctx(root.path(), section).with_submission("s1");
        let result = run(&ctx);

        assert_eq!(result.kind, ResultKind::Pass);
        assert_eq!(result.outcome.as_ref().unwrap().value, Some(2.0));
        assert!(root.path().join("temp").join("src").join("main.py").is_file());
        match result.output {
            Some(StageOutput::Checklist { items }) => {
                assert_eq!(items[STEP_FIND].state, Some(true));
                assert_eq!(items[STEP_COPY_SUBMISSION].state, Some(true));
                assert_eq!(items[STEP_COPY_FRAMEWORK].state, None);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_missing_submission_is_critical() {
        let root = tempfile::tempdir().unwrap();
        let ctx = ctx(root.path(), Section::new("stage_init")).with_submission("ghost");
        let result = run(&ctx);

        assert_eq!(result.kind, ResultKind::Critical);
        assert!(result.error_text().unwrap().contains("ghost"));
        let outcome = result.outcome.unwrap();
        assert_eq!(outcome.key, Some(KEY_NOSUBMISSION));
        assert_eq!(outcome.value, Some(0.0));
    }

    #[test]
    fn test_empty_submission_is_critical() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("submissions").join("s2")).unwrap();
        let ctx = ctx(root.path(), Section::new("stage_init")).with_submission("s2");
        assert_eq!(run(&ctx).kind, ResultKind::Critical);
    }
}
