//! Typed shapes of the generator's structured outputs.
//!
//! The structs double as JSON schemas for the prompts. Parsing is lenient
//! where the loop can make progress with partial output (seed lists, gap
//! suggestions) and strict where a malformed value is useless (synthesis,
//! final report).

use crate::task::{Task, priority_from_value};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Synthesis results keyed by task description, in the order tasks were
/// synthesized.
pub type SynthesisMap = IndexMap<String, SynthesisEntry>;

/// Shape requested from the seeding step.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaskDraft {
    /// Clear, actionable research task.
    pub description: String,
    /// 1-10, higher is more important.
    pub priority: u8,
    /// Always "research".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Extracts tasks from a seeding reply. Items without a usable description
/// are skipped; the caller decides whether an empty result is fatal.
pub fn seed_tasks(value: Value) -> Result<Vec<Task>, String> {
    let Value::Array(items) = value else {
        return Err("expected a json array of tasks".to_string());
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let description = item.get("description")?.as_str()?.trim();
            if description.is_empty() {
                return None;
            }
            Some(Task::research(
                description,
                priority_from_value(item.get("priority")),
            ))
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SynthesisEntry {
    #[serde(alias = "synthesized_summary")]
    pub summary: String,

    #[serde(default, alias = "strongly_supported_points")]
    pub key_points: Vec<String>,

    #[serde(default, alias = "core_concepts")]
    pub derived_tags: BTreeSet<String>,

    /// Areas where the evidence was thin or missing.
    #[serde(
        default,
        alias = "weak_or_missing_areas",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub weak_areas: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuggestedTask {
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u8>")]
    pub priority: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
pub struct GapReport {
    pub suggested_tasks: Vec<SuggestedTask>,

    /// Free-form analysis (`global_gaps`, `coverage_assessment`, ...) carried
    /// into the report context untouched.
    #[serde(flatten)]
    #[schemars(skip)]
    pub analysis: Map<String, Value>,
}

impl GapReport {
    /// `None` when the reply is not an object or its suggestion list is not an
    /// array. Suggestions that are not objects are dropped individually.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut analysis) = value else {
            return None;
        };

        let suggestions = analysis
            .remove("suggested_tasks")
            .or_else(|| analysis.remove("suggested_new_tasks"))
            .unwrap_or(Value::Array(Vec::new()));

        let Value::Array(items) = suggestions else {
            return None;
        };

        Some(Self {
            suggested_tasks: items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            analysis,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSection {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assessment {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
}

/// Only `executive_summary` is required. An optional section whose shape
/// does not match is kept verbatim in `extra` under its own key instead of
/// failing the run.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct FinalReport {
    pub executive_summary: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_sections: Option<Vec<ReportSection>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_assessment: Option<Assessment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identified_gaps: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_next_steps: Option<Vec<String>>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: Map<String, Value>,
}

impl FinalReport {
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(mut fields) = value else {
            return Err("expected a json object".to_string());
        };

        let executive_summary = match fields.remove("executive_summary") {
            Some(Value::String(summary)) => summary,
            _ => return Err("missing string field `executive_summary`".to_string()),
        };

        Ok(Self {
            executive_summary,
            research_sections: take_typed(&mut fields, "research_sections"),
            overall_assessment: take_typed(&mut fields, "overall_assessment"),
            identified_gaps: take_typed(&mut fields, "identified_gaps"),
            recommended_next_steps: take_typed(&mut fields, "recommended_next_steps"),
            extra: fields,
        })
    }
}

/// Moves `key` out of `fields` only when it parses as `T`.
fn take_typed<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let parsed = T::deserialize(fields.get(key)?).ok()?;
    fields.remove(key);
    Some(parsed)
}
