//! Gatekeeping for tasks proposed by gap detection.
//!
//! Rules run in a fixed order and the first match rejects: empty text,
//! blocked phrasing, lexical overlap with an existing task, store capacity.
//! The filter never mutates anything; callers append admitted tasks and
//! pass the refreshed description list for the next candidate.

use crate::config::AdmissionConfig;
use crate::model::SuggestedTask;
use crate::task::{Task, normalize, priority_from_value};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Blocked(String),
    Similar(String),
    Capacity,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Admit(Task),
    Reject(Rejection),
}

pub struct AdmissionFilter {
    blocked: Vec<String>,
    similarity_threshold: usize,
    max_total_tasks: usize,
}

impl AdmissionFilter {
    pub fn new(config: &AdmissionConfig, max_total_tasks: usize) -> Self {
        Self {
            blocked: config
                .blocked_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            similarity_threshold: config.similarity_threshold,
            max_total_tasks,
        }
    }

    /// Boolean form of [`AdmissionFilter::evaluate`]; the controller uses the
    /// full decision so it can log the rejection reason.
    #[cfg(test)]
    pub fn admit<S: AsRef<str>>(&self, candidate: &SuggestedTask, existing: &[S]) -> bool {
        matches!(self.evaluate(candidate, existing), Decision::Admit(_))
    }

    pub fn evaluate<S: AsRef<str>>(&self, candidate: &SuggestedTask, existing: &[S]) -> Decision {
        let description = candidate.description.trim();
        if description.is_empty() {
            return Decision::Reject(Rejection::Empty);
        }

        let lowered = description.to_lowercase();
        if let Some(keyword) = self.blocked.iter().find(|k| lowered.contains(k.as_str())) {
            return Decision::Reject(Rejection::Blocked(keyword.clone()));
        }

        if let Some(similar) = existing
            .iter()
            .map(AsRef::as_ref)
            .find(|other| self.is_similar(description, other))
        {
            return Decision::Reject(Rejection::Similar(similar.to_string()));
        }

        if existing.len() + 1 > self.max_total_tasks {
            return Decision::Reject(Rejection::Capacity);
        }

        Decision::Admit(Task::research(
            description,
            priority_from_value(candidate.priority.as_ref()),
        ))
    }

    /// Identical after normalization, or sharing at least the threshold
    /// number of case-folded whitespace tokens.
    fn is_similar(&self, a: &str, b: &str) -> bool {
        if normalize(a) == normalize(b) {
            return true;
        }
        word_set(a).intersection(&word_set(b)).count() >= self.similarity_threshold
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
