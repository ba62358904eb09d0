use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_PRIORITY: u8 = 5;
pub const RESEARCH_KIND: &str = "research";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Synthesized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub priority: u8,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn research(description: impl Into<String>, priority: u8) -> Self {
        Self {
            description: description.into(),
            priority,
            kind: RESEARCH_KIND.to_string(),
            status: TaskStatus::Pending,
        }
    }
}

/// Comparison key for descriptions: trimmed, inner whitespace collapsed,
/// lower-cased.
pub fn normalize(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Generator-supplied priorities arrive as arbitrary JSON. Numbers are rounded
/// and clamped to 1..=10; anything else falls back to the default.
pub fn priority_from_value(value: Option<&Value>) -> u8 {
    match value.and_then(Value::as_f64) {
        Some(p) if p.is_finite() => p.round().clamp(1.0, 10.0) as u8,
        _ => DEFAULT_PRIORITY,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
    Full,
}

/// Ordered, bounded task list keyed by normalized description. Tasks are
/// never removed during a run.
#[derive(Debug)]
pub struct TaskStore {
    tasks: Vec<Task>,
    keys: HashSet<String>,
    capacity: usize,
}

impl TaskStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: Vec::new(),
            keys: HashSet::new(),
            capacity,
        }
    }

    /// Adding a description already present is a no-op, not an error.
    pub fn add(&mut self, task: Task) -> AddOutcome {
        let key = normalize(&task.description);
        if self.keys.contains(&key) {
            return AddOutcome::Duplicate;
        }
        if self.is_full() {
            return AddOutcome::Full;
        }

        self.keys.insert(key);
        self.tasks.push(task);
        AddOutcome::Added
    }

    pub fn contains(&self, description: &str) -> bool {
        self.keys.contains(&normalize(description))
    }

    pub fn mark_synthesized(&mut self, description: &str) -> bool {
        let key = normalize(description);
        match self
            .tasks
            .iter_mut()
            .find(|t| normalize(&t.description) == key)
        {
            Some(task) => {
                task.status = TaskStatus::Synthesized;
                true
            }
            None => false,
        }
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.description.as_str())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }
}
