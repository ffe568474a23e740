//! Terminal rendering of a controller session.

use feedbacker_core::report::format_number;
use feedbacker_core::stage::OutcomeSummary;
use feedbacker_core::{Alert, StageDescriptor, StageOutput, StageState, View};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What the session has shown so far, readable after the view is handed
/// to a controller.
#[derive(Debug, Default)]
pub struct Session {
    labels: HashMap<String, String>,
    outputs: HashMap<String, StageOutput>,
    alerts: Vec<Alert>,
}

impl Session {
    pub fn label<'a>(&'a self, stage_id: &'a str) -> &'a str {
        self.labels.get(stage_id).map(String::as_str).unwrap_or(stage_id)
    }

    /// Unanswered required questions of a form stage.
    pub fn outstanding(&self, stage_id: &str) -> Option<&[String]> {
        match self.outputs.get(stage_id) {
            Some(StageOutput::Form { outstanding, .. }) => Some(outstanding),
            _ => None,
        }
    }

    pub fn halted(&self) -> bool {
        self.alerts.iter().any(|a| a.halt)
    }
}

pub struct ConsoleView {
    session: Arc<Mutex<Session>>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for ConsoleView {
    fn append_stage(&mut self, descriptor: &StageDescriptor) {
        self.session
            .lock()
            .labels
            .insert(descriptor.stage_id.clone(), descriptor.label.clone());
    }

    fn show_stage(&mut self, stage_id: &str, label: &str) {
        tracing::debug!(stage = %stage_id, label = %label, "Showing stage");
    }

    fn set_stage_state(&mut self, stage_id: &str, state: StageState) {
        let session = self.session.lock();
        println!("[{}] {}", state, session.label(stage_id));
    }

    fn set_stage_output(&mut self, stage_id: &str, output: &StageOutput) {
        print_output(output);
        self.session
            .lock()
            .outputs
            .insert(stage_id.to_string(), output.clone());
    }

    fn show_alert(&mut self, alert: &Alert) {
        eprintln!("{}: {}", alert.title, alert.text);
        if alert.halt {
            eprintln!("Assessment halted.");
        }
        self.session.lock().alerts.push(alert.clone());
    }

    fn set_score(&mut self, score: f64) {
        tracing::debug!(score, "Score updated");
    }
}

fn print_output(output: &StageOutput) {
    match output {
        StageOutput::None => {}
        StageOutput::Text { text } | StageOutput::EditText { text, .. } => {
            for line in text.lines() {
                println!("    {}", line);
            }
        }
        StageOutput::Form { form, outstanding } => {
            for question in &form.questions {
                let marker = if outstanding.contains(&question.num) { "*" } else { " " };
                println!("  {} {}. {}", marker, question.num, question.display_text());
            }
        }
        StageOutput::Checklist { items } => {
            for item in items {
                let mark = match item.state {
                    Some(true) => "x",
                    Some(false) => "!",
                    None => " ",
                };
                println!("    [{}] {}", mark, item.label);
            }
        }
        StageOutput::Marker { summary } => {
            println!("    {} submissions", summary.submissions);
            for outcome in &summary.outcomes {
                print_outcome_summary(outcome);
            }
        }
    }
}

fn print_outcome_summary(summary: &OutcomeSummary) {
    match summary {
        OutcomeSummary::Scale {
            outcome_id,
            options,
            counts,
            marks,
            ..
        } => {
            println!("    {}", outcome_id);
            for ((option, count), mark) in options.iter().zip(counts).zip(marks) {
                let mark = mark.map(format_number).unwrap_or_else(|| "-".to_string());
                println!("      {:<20} {:>4}  mark {}", option.label, count, mark);
            }
        }
        OutcomeSummary::Single {
            outcome_id,
            count,
            mean,
            mark,
            ..
        } => {
            let mean = mean.map(format_number).unwrap_or_else(|| "-".to_string());
            let mark = mark.map(format_number).unwrap_or_else(|| "-".to_string());
            println!("    {:<22} {:>4}  mean {}  mark {}", outcome_id, count, mean, mark);
        }
    }
}
