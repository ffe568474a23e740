//! On-disk persistence of the model and rendered reports.
//!
//! Everything lives under `app.dir_output` using the `model_file` names.

use anyhow::{Context, Result};
use feedbacker_core::config::ModelFiles;
use feedbacker_core::report::{self, TableKind};
use feedbacker_core::{Config, Model};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileStore {
    dir: PathBuf,
    files: ModelFiles,
}

impl FileStore {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.app.dir_output.clone(),
            files: config.files.clone(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load outcomes, feedback and marks.
    ///
    /// A missing or unreadable file yields an empty part.
    pub fn load(&self) -> Model {
        Model {
            outcomes: self.load_part(&self.files.outcomes),
            feedback: self.load_part(&self.files.feedbacks),
            marks: self.load_part(&self.files.marks),
        }
    }

    fn load_part<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "No stored data, starting empty");
                return T::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(part) => part,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Stored data is not valid JSON, starting empty");
                T::default()
            }
        }
    }

    pub fn save_model(&self, model: &Model) -> Result<()> {
        self.save_part(&self.files.outcomes, &model.outcomes)?;
        self.save_part(&self.files.feedbacks, &model.feedback)?;
        self.save_part(&self.files.marks, &model.marks)?;
        Ok(())
    }

    fn save_part<T: Serialize>(&self, name: &str, part: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(part)?;
        self.write(name, &json)?;
        Ok(())
    }

    pub fn write_scores(&self, config: &Config, model: &Model) -> Result<PathBuf> {
        self.write(&self.files.scores_csv, &report::csv_table(config, model, TableKind::Scores))
    }

    pub fn write_marks(&self, config: &Config, model: &Model) -> Result<PathBuf> {
        self.write(&self.files.marks_csv, &report::csv_table(config, model, TableKind::Marks))
    }

    pub fn write_final_feedback(
        &self,
        config: &Config,
        model: &Model,
        submission: &str,
    ) -> Result<PathBuf> {
        let name = report::final_feedback_path(&self.files, submission);
        self.write(&name, &report::final_feedback(config, model, submission))
    }

    fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::debug!(path = %path.display(), "Written");
        Ok(path)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))
}
