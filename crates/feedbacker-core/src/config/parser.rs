//! Configuration parsing from YAML/JSON into a typed value object.

use super::schema::validate_config_schema;
use super::section::Section;
use crate::model::{Bounds, BoundsTable};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {section}.{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

fn default_app_name() -> String {
    "feedbacker".to_string()
}

/// The `app` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub name: String,

    /// Re-raise handler construction failures instead of reporting them
    pub debug: bool,

    pub dir_temp: PathBuf,
    pub dir_submissions: PathBuf,
    pub dir_output: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            debug: false,
            dir_temp: std::env::temp_dir().join("feedbacker"),
            dir_submissions: PathBuf::from("submissions"),
            dir_output: PathBuf::from("."),
        }
    }
}

/// The `assessment` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentConfig {
    pub stages: Vec<String>,
    pub score: Bounds,
    pub mark: Bounds,
    pub progress_on_success: bool,
    pub halt_on_error: bool,
    pub scores_are_marks: bool,
}

/// One `stage_<id>` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub stage_id: String,
    pub label: String,

    /// Registered handler type name
    pub handler: String,

    pub score: Bounds,
    pub mark: Bounds,
    pub feedback_pre: Option<String>,
    pub feedback_post: Option<String>,

    /// Inherits the assessment value when unset
    pub halt_on_error: bool,

    /// The raw section, for handler-specific keys
    pub section: Section,
}

/// Output file names from the `model_file` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub outcomes: String,
    pub feedbacks: String,
    pub marks: String,
    pub scores_csv: String,
    pub marks_csv: String,

    /// Per-submission path; `##submission##` is replaced by the id
    pub final_feedback: String,
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            outcomes: "outcomes.json".to_string(),
            feedbacks: "feedbacks.json".to_string(),
            marks: "outcomes_marks.json".to_string(),
            scores_csv: "scores.csv".to_string(),
            marks_csv: "marks.csv".to_string(),
            final_feedback: "feedback_##submission##.txt".to_string(),
        }
    }
}

/// A fully parsed configuration, built once and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app: AppConfig,
    pub assessment: AssessmentConfig,
    pub stages: Vec<StageConfig>,
    pub files: ModelFiles,
    sections: BTreeMap<String, Section>,
}

impl Config {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let document: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&document)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(&document)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from a file, choosing JSON for a `.json` extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Validate the document shape, then build typed sections.
    pub fn from_value(document: &serde_json::Value) -> Result<Self, ConfigError> {
        validate_config_schema(document).map_err(ConfigError::SchemaError)?;

        let mut sections = BTreeMap::new();
        if let Some(object) = document.as_object() {
            for (name, value) in object {
                sections.insert(name.clone(), Section::from_value(name, value)?);
            }
        }

        let empty = |name: &str| Section::new(name);
        let app_section = sections.get("app").cloned().unwrap_or_else(|| empty("app"));
        let assessment_section = sections
            .get("assessment")
            .cloned()
            .ok_or_else(|| ConfigError::MissingField("assessment".to_string()))?;
        let files_section = sections
            .get("model_file")
            .cloned()
            .unwrap_or_else(|| empty("model_file"));

        let app = parse_app(&app_section)?;
        let assessment = parse_assessment(&assessment_section)?;

        let mut stages = Vec::with_capacity(assessment.stages.len());
        for stage_id in &assessment.stages {
            let name = format!("stage_{}", stage_id);
            let section = sections
                .get(&name)
                .ok_or_else(|| ConfigError::MissingField(name.clone()))?;
            stages.push(parse_stage(stage_id, section, &assessment)?);
        }

        Ok(Self {
            app,
            assessment,
            stages,
            files: parse_files(&files_section),
            sections,
        })
    }

    /// A raw section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.stage_id.as_str())
    }

    /// Score bounds for the assessment and each stage.
    pub fn score_bounds(&self) -> BoundsTable {
        self.stages
            .iter()
            .fold(BoundsTable::new(self.assessment.score), |table, stage| {
                table.with_stage(stage.stage_id.clone(), stage.score)
            })
    }

    /// Mark bounds for the assessment and each stage.
    pub fn mark_bounds(&self) -> BoundsTable {
        self.stages
            .iter()
            .fold(BoundsTable::new(self.assessment.mark), |table, stage| {
                table.with_stage(stage.stage_id.clone(), stage.mark)
            })
    }
}

fn parse_bounds(section: &Section, prefix: &str) -> Result<Bounds, ConfigError> {
    Ok(Bounds::new(
        section.get_f64(&format!("{}_min", prefix))?,
        section.get_f64(&format!("{}_max", prefix))?,
    ))
}

fn parse_app(section: &Section) -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    Ok(AppConfig {
        name: section
            .get("name")
            .map(str::to_string)
            .unwrap_or(defaults.name),
        debug: section.get_bool("debug")?.unwrap_or(false),
        dir_temp: section.get("dir_temp").map(PathBuf::from).unwrap_or(defaults.dir_temp),
        dir_submissions: section
            .get("dir_submissions")
            .map(PathBuf::from)
            .unwrap_or(defaults.dir_submissions),
        dir_output: section
            .get("dir_output")
            .map(PathBuf::from)
            .unwrap_or(defaults.dir_output),
    })
}

fn parse_assessment(section: &Section) -> Result<AssessmentConfig, ConfigError> {
    let stages: Vec<String> = section
        .get_list("stages")?
        .unwrap_or_default()
        .into_iter()
        .filter(|id| !id.is_empty())
        .collect();

    if stages.is_empty() {
        return Err(ConfigError::ValidationError(
            "assessment.stages must name at least one stage".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stage_id in &stages {
        if !seen.insert(stage_id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate stage id: {}",
                stage_id
            )));
        }
    }

    Ok(AssessmentConfig {
        stages,
        score: parse_bounds(section, "score")?,
        mark: parse_bounds(section, "mark")?,
        progress_on_success: section.get_bool("progress_on_success")?.unwrap_or(true),
        halt_on_error: section.get_bool("halt_on_error")?.unwrap_or(false),
        scores_are_marks: section.get_bool("scores_are_marks")?.unwrap_or(false),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

fn parse_stage(
    stage_id: &str,
    section: &Section,
    assessment: &AssessmentConfig,
) -> Result<StageConfig, ConfigError> {
    Ok(StageConfig {
        stage_id: stage_id.to_string(),
        label: section.require("label")?.to_string(),
        handler: section.require("handler")?.trim().to_string(),
        score: parse_bounds(section, "score")?,
        mark: parse_bounds(section, "mark")?,
        feedback_pre: non_blank(section.get("feedback_pre")),
        feedback_post: non_blank(section.get("feedback_post")),
        halt_on_error: section
            .get_bool("halt_on_error")?
            .unwrap_or(assessment.halt_on_error),
        section: section.clone(),
    })
}

fn parse_files(section: &Section) -> ModelFiles {
    let defaults = ModelFiles::default();
    let pick = |key: &str, default: String| section.get(key).map(str::to_string).unwrap_or(default);
    ModelFiles {
        outcomes: pick("file_outcomes", defaults.outcomes),
        feedbacks: pick("file_feedbacks", defaults.feedbacks),
        marks: pick("file_outcomes_marks", defaults.marks),
        scores_csv: pick("file_scores", defaults.scores_csv),
        marks_csv: pick("file_marks", defaults.marks_csv),
        final_feedback: pick("file_final_feedback", defaults.final_feedback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
app:
  name: "Coursework 1"
  debug: false
  dir_submissions: "subs"
assessment:
  stages: "init, quality"
  score_min: 0
  score_max: 20
  mark_max: 100
  halt_on_error: true
stage_init:
  label: "Submission check"
  handler: submission_check
  score_max: 1
  feedback_post: "Submitted."
stage_quality:
  label: "Code quality"
  handler: form
  halt_on_error: false
  question1: "Readability"
  type1: scale
  answer1: '["Poor", "Good"]'
  score1: "0, 10"
model_file:
  file_scores: "out/scores.csv"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert_eq!(config.app.name, "Coursework 1");
        assert_eq!(config.app.dir_submissions, PathBuf::from("subs"));
        assert_eq!(config.assessment.stages, vec!["init", "quality"]);
        assert!(config.assessment.progress_on_success);
        assert_eq!(config.assessment.score, Bounds::new(Some(0.0), Some(20.0)));

        let init = config.stage("init").unwrap();
        assert_eq!(init.handler, "submission_check");
        assert!(init.halt_on_error);
        assert_eq!(init.feedback_post.as_deref(), Some("Submitted."));
        assert_eq!(init.feedback_pre, None);

        let quality = config.stage("quality").unwrap();
        assert!(!quality.halt_on_error);
        assert_eq!(quality.section.get("type1"), Some("scale"));

        assert_eq!(config.files.scores_csv, "out/scores.csv");
        assert_eq!(config.files.outcomes, "outcomes.json");
    }

    #[test]
    fn test_bounds_tables() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let scores = config.score_bounds();
        assert_eq!(scores.overall.max, Some(20.0));
        assert_eq!(scores.for_stage("init").max, Some(1.0));
        assert!(scores.for_stage("quality").is_unbounded());
        assert_eq!(config.mark_bounds().overall.max, Some(100.0));
    }

    #[test]
    fn test_stage_list_as_sequence() {
        let yaml = r#"
assessment:
  stages: [a]
stage_a:
  label: A
  handler: none
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.stage_ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_missing_stage_section_fails() {
        let yaml = r#"
assessment:
  stages: "a, b"
stage_a:
  label: A
  handler: none
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "stage_b"));
    }

    #[test]
    fn test_duplicate_stage_fails() {
        let yaml = r#"
assessment:
  stages: "a, a"
stage_a:
  label: A
  handler: none
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_bad_number_fails() {
        let yaml = r#"
assessment:
  stages: a
  score_max: lots
stage_a:
  label: A
  handler: none
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "assessment": {"stages": ["a"], "progress_on_success": false},
            "stage_a": {"label": "A", "handler": "none"}
        }"#;
        let config = Config::from_json(json).unwrap();
        assert!(!config.assessment.progress_on_success);
    }

    #[test]
    fn test_schema_errors_are_reported() {
        let yaml = "app:\n  name: x\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::SchemaError(_))
        ));
    }
}
