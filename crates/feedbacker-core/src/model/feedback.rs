//! Feedback text containers.

use super::ordered::OrderedMap;
use serde::{Deserialize, Serialize};

/// Identifier of the fragment appended before a stage runs.
pub const FEEDBACK_PRE: &str = "__pre";

/// Identifier of the fragment appended after a stage finishes.
pub const FEEDBACK_POST: &str = "__post";

/// Replace escaped newline sequences with real newlines.
pub fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Join fragments with one space, unless the previous fragment already ends
/// in a newline or tab. Fragments are stripped of surrounding spaces and
/// empty ones are skipped.
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut joined = String::new();
    for fragment in fragments {
        let fragment = fragment.trim_matches(' ');
        if fragment.is_empty() {
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('\n') && !joined.ends_with('\t') {
            joined.push(' ');
        }
        joined.push_str(fragment);
    }
    joined
}

/// Feedback fragments of one stage for one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feedbacks {
    fragments: OrderedMap<String>,
}

impl Feedbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fragment, unescaping `\n` sequences.
    pub fn set(&mut self, feedback_id: &str, text: &str) {
        self.fragments.insert(feedback_id, unescape(text));
    }

    pub fn get(&self, feedback_id: &str) -> Option<&str> {
        self.fragments.get(feedback_id).map(String::as_str)
    }

    pub fn remove(&mut self, feedback_id: &str) -> Option<String> {
        self.fragments.remove(feedback_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Non-empty fragments in order.
    pub fn fragments(&self) -> Vec<&str> {
        self.fragments
            .values()
            .map(|f| f.trim_matches(' '))
            .filter(|f| !f.is_empty())
            .collect()
    }

    /// The stage's combined feedback text.
    pub fn text(&self) -> String {
        join_fragments(self.fragments.values().map(String::as_str))
    }
}

/// Feedback of every stage for one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackByStage {
    stages: OrderedMap<Feedbacks>,
}

impl FeedbackByStage {
    pub fn stage(&self, stage_id: &str) -> Option<&Feedbacks> {
        self.stages.get(stage_id)
    }

    /// Get-or-create the feedback of a stage.
    pub fn stage_mut(&mut self, stage_id: &str) -> &mut Feedbacks {
        self.stages.entry(stage_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feedbacks)> {
        self.stages.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.values().all(Feedbacks::is_empty)
    }

    /// All stage feedback, each stage followed by a blank line.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for feedbacks in self.stages.values() {
            text.push_str(&feedbacks.text());
            text.push_str("\n\n");
        }
        text
    }
}

/// Feedback of every submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllFeedback {
    submissions: OrderedMap<FeedbackByStage>,
}

impl AllFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission(&self, submission: &str) -> Option<&FeedbackByStage> {
        self.submissions.get(submission)
    }

    /// Get-or-create the feedback of a submission.
    pub fn submission_mut(&mut self, submission: &str) -> &mut FeedbackByStage {
        self.submissions.entry(submission)
    }

    pub fn contains(&self, submission: &str) -> bool {
        self.submissions.contains_key(submission)
    }

    pub fn remove(&mut self, submission: &str) -> Option<FeedbackByStage> {
        self.submissions.remove(submission)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeedbackByStage)> {
        self.submissions.iter()
    }
}
