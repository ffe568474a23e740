//! Rendered reports: the scores/marks tables and the final feedback document.
//!
//! Everything here is a pure function of the configuration and the model;
//! writing the results to disk is left to the caller.

use crate::config::{Config, ModelFiles};
use crate::model::{resolve_mark, Bounds, Model};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"##([A-Za-z0-9_]+)##").unwrap();
}

/// Which quantity a table reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Scores,
    Marks,
}

/// Format a number the way the tables and feedback show it: integral
/// values keep one decimal place.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn format_bound(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "None".to_string())
}

fn insert_bounds(values: &mut BTreeMap<String, String>, prefix: &str, quantity: &str, bounds: Bounds) {
    values.insert(format!("{}{}_min", prefix, quantity), format_bound(bounds.min));
    values.insert(format!("{}{}_max", prefix, quantity), format_bound(bounds.max));
}

/// Every `##placeholder##` value for one submission.
pub fn placeholders(config: &Config, model: &Model, submission: &str) -> BTreeMap<String, String> {
    let score_bounds = config.score_bounds();
    let mark_bounds = config.mark_bounds();
    let mut values = BTreeMap::new();

    values.insert("submission".to_string(), submission.to_string());
    values.insert(
        "score".to_string(),
        format_number(model.score(submission, &score_bounds)),
    );
    values.insert(
        "mark".to_string(),
        format_number(model.mark(submission, &mark_bounds)),
    );
    insert_bounds(&mut values, "", "score", config.assessment.score);
    insert_bounds(&mut values, "", "mark", config.assessment.mark);

    let stages = model.outcomes.submission(submission);
    for stage in &config.stages {
        let prefix = format!("stage_{}_", stage.stage_id);
        let (score, mark) = match stages {
            Some(stages) => (
                stages.stage_score(&stage.stage_id, &score_bounds),
                stages.stage_mark(&stage.stage_id, &model.marks, &mark_bounds),
            ),
            None => (stage.score.clamp(0.0), stage.mark.clamp(0.0)),
        };
        values.insert(format!("{}score", prefix), format_number(score));
        values.insert(format!("{}mark", prefix), format_number(mark));
        insert_bounds(&mut values, &prefix, "score", stage.score);
        insert_bounds(&mut values, &prefix, "mark", stage.mark);
    }

    values
}

/// Replace known `##name##` tokens; unknown tokens are left untouched.
pub fn render_placeholders(template: &str, values: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// The submission's feedback with its placeholders filled in.
pub fn final_feedback(config: &Config, model: &Model, submission: &str) -> String {
    let text = model
        .feedback
        .submission(submission)
        .map(|stages| stages.text())
        .unwrap_or_default();
    render_placeholders(&text, &placeholders(config, model, submission))
}

/// File name of a submission's final feedback document.
pub fn final_feedback_path(files: &ModelFiles, submission: &str) -> String {
    files.final_feedback.replace("##submission##", submission)
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the scores or marks table.
///
/// Three header lines (title, stage ids, outcome ids) precede one row per
/// submission. Each row ends with the submission's clamped total.
pub fn csv_table(config: &Config, model: &Model, kind: TableKind) -> String {
    let columns = model.outcomes.columns();
    let title = match kind {
        TableKind::Scores => format!("{} scores", config.app.name),
        TableKind::Marks => format!("{} marks", config.app.name),
    };

    let mut stage_header = vec!["submission".to_string()];
    let mut previous: Option<&str> = None;
    for (stage_id, _) in &columns {
        if previous == Some(stage_id.as_str()) {
            stage_header.push(String::new());
        } else {
            stage_header.push(csv_field(stage_id));
        }
        previous = Some(stage_id.as_str());
    }
    stage_header.push("sum".to_string());

    let mut outcome_header = vec!["submission".to_string()];
    outcome_header.extend(columns.iter().map(|(_, outcome_id)| csv_field(outcome_id)));
    outcome_header.push("sum".to_string());

    let mut lines = vec![csv_field(&title), stage_header.join(","), outcome_header.join(",")];

    let score_bounds = config.score_bounds();
    let mark_bounds = config.mark_bounds();
    for (submission, stages) in model.outcomes.iter() {
        let mut row = vec![csv_field(submission)];
        for (stage_id, outcome_id) in &columns {
            let outcome = stages.stage(stage_id).and_then(|o| o.get(outcome_id));
            let value = match (kind, outcome) {
                (_, None) => 0.0,
                (TableKind::Scores, Some(outcome)) => outcome.value.unwrap_or(0.0),
                (TableKind::Marks, Some(outcome)) => {
                    let mark = model.marks.stage(stage_id).and_then(|m| m.get(outcome_id));
                    resolve_mark(outcome, mark).unwrap_or(0.0)
                }
            };
            row.push(format_number(value));
        }
        let total = match kind {
            TableKind::Scores => stages.score(&score_bounds),
            TableKind::Marks => stages.mark(&model.marks, &mark_bounds),
        };
        row.push(format_number(total));
        lines.push(row.join(","));
    }

    let mut table = lines.join("\n");
    table.push('\n');
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, ScaleOption};

    const CONFIG: &str = r#"
app:
  name: CS101
assessment:
  stages: [style, tests]
  score_min: 0
  score_max: 10
stage_style:
  label: Style
  handler: form
  score_max: 4
stage_tests:
  label: Tests
  handler: process
  command: "true"
"#;

    fn model() -> Model {
        let mut model = Model::new();
        let style = model.outcomes.submission_mut("alice").stage_mut("style");
        let scale = Outcome::scale(
            "1",
            vec![ScaleOption::new("poor", 1.0), ScaleOption::new("good", 5.0)],
        );
        style.set("1", scale.with_key(1).unwrap());
        let tests = model.outcomes.submission_mut("alice").stage_mut("tests");
        tests.set("exit_status", Outcome::fixed("exit_status", 3.0));

        model
            .feedback
            .submission_mut("alice")
            .stage_mut("style")
            .set("__pre", "Hello ##submission##, score ##score##/##score_max##.");
        model
            .feedback
            .submission_mut("alice")
            .stage_mut("tests")
            .set("1", "Tests scored ##stage_tests_score## (min ##stage_tests_score_min##). ##unknown##");
        model
    }

    #[test]
    fn test_final_feedback_substitutes_placeholders() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let text = final_feedback(&config, &model(), "alice");
        assert!(text.starts_with("Hello alice, score 7.0/10.0."));
        assert!(text.contains("Tests scored 3.0 (min None). ##unknown##"));
    }

    #[test]
    fn test_final_feedback_path() {
        let files = ModelFiles::default();
        assert_eq!(final_feedback_path(&files, "bob"), "feedback_bob.txt");
    }

    #[test]
    fn test_scores_table() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let table = csv_table(&config, &model(), TableKind::Scores);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "CS101 scores");
        assert_eq!(lines[1], "submission,style,tests,sum");
        assert_eq!(lines[2], "submission,1,exit_status,sum");
        // style clamps 5.0 to 4.0 in the total
        assert_eq!(lines[3], "alice,5.0,3.0,7.0");
    }

    #[test]
    fn test_marks_table_uses_per_key_marks() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let mut model = model();
        let marks = model.marks.stage_mut("style");
        marks.set_key("1", 0, 0.5);
        marks.set_key("1", 1, 2.0);

        let table = csv_table(&config, &model, TableKind::Marks);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "CS101 marks");
        assert_eq!(lines[3], "alice,2.0,3.0,5.0");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2.0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-1.0), "-1.0");
    }
}
