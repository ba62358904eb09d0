//! Scripted capabilities for exercising the controller without network access.

use crate::config::Limits;
use crate::controller::{Controller, ControllerBuilder};
use crate::prompts;
use agent::llm::{CompletionRequest, CompletionResponse, LLM, Message};
use agent::{Evidence, LlmGenerator, Retriever};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Longer than any configured timeout.
const STALL: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Seed(String),
    Synthesis(String),
    Gaps,
    Report,
}

/// Chat model that answers by recognising which prompt it was given.
pub struct ScriptedLLM {
    seed: String,
    gaps: Mutex<VecDeque<String>>,
    report: String,
    failing_synthesis: Vec<String>,
    stalled: Vec<&'static str>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedLLM {
    pub fn new(seed: String) -> Self {
        Self {
            seed,
            gaps: Mutex::new(VecDeque::new()),
            report: answer(json!({
                "executive_summary": "Findings were consolidated.",
                "research_sections": [],
                "overall_assessment": {"strengths": [], "limitations": []},
                "identified_gaps": [],
                "recommended_next_steps": []
            })),
            failing_synthesis: Vec::new(),
            stalled: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies for successive gap detection calls; once exhausted every call
    /// suggests nothing.
    pub fn gaps(self, replies: Vec<String>) -> Self {
        *self.gaps.lock().unwrap() = replies.into();
        self
    }

    pub fn report(mut self, reply: String) -> Self {
        self.report = reply;
        self
    }

    pub fn failing_synthesis(mut self, tasks: &[&str]) -> Self {
        self.failing_synthesis = tasks.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Replies to `prompt` only after [`STALL`] has elapsed.
    pub fn stalling(mut self, prompt: &'static str) -> Self {
        self.stalled.push(prompt);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn synthesized(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Synthesis(task) => Some(task),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn reply(&self, instructions: &str, context: &str) -> String {
        if instructions.starts_with(prompts::SEED_PROMPT) {
            self.record(Call::Seed(context.to_string()));
            return self.seed.clone();
        }

        if instructions.starts_with(prompts::SYNTHESIS_PROMPT) {
            let context: Value = serde_json::from_str(context).unwrap();
            let task = context["task"].as_str().unwrap().to_string();
            self.record(Call::Synthesis(task.clone()));

            if self.failing_synthesis.contains(&task) {
                return "I was unable to produce a synthesis.".to_string();
            }
            return answer(json!({
                "summary": format!("Findings for {task}"),
                "key_points": ["point one", "point two"],
                "derived_tags": ["energy"]
            }));
        }

        if instructions.starts_with(prompts::GAP_PROMPT) {
            self.record(Call::Gaps);
            return self
                .gaps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| gap_reply(&[]));
        }

        if instructions.starts_with(prompts::REPORT_PROMPT) {
            self.record(Call::Report);
            return self.report.clone();
        }

        panic!("unexpected instructions: {instructions}");
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> agent::Result<CompletionResponse> {
        match request.messages {
            [Message::System(instructions), Message::User(context)] => {
                let content = self.reply(instructions, context);
                if self.stalled.iter().any(|p| instructions.starts_with(p)) {
                    tokio::time::sleep(STALL).await;
                }
                Ok(CompletionResponse { content })
            }
            _ => panic!("unexpected message sequence"),
        }
    }
}

/// Returns two records per query unless the query is listed as failing or
/// stalled.
#[derive(Default)]
pub struct MockRetriever {
    failing: Vec<String>,
    stalled: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockRetriever {
    pub fn failing(tasks: &[&str]) -> Self {
        Self {
            failing: tasks.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn stalling(tasks: &[&str]) -> Self {
        Self {
            stalled: tasks.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, query: &str) -> agent::Result<Vec<Evidence>> {
        self.calls.lock().unwrap().push(query.to_string());

        if self.stalled.iter().any(|s| s == query) {
            tokio::time::sleep(STALL).await;
        }

        if self.failing.iter().any(|f| f == query) {
            return Err(agent::Error::SearchResponseError(
                "search returned status 503 Service Unavailable".to_string(),
            ));
        }

        Ok((1..=2)
            .map(|n| Evidence {
                source: format!("https://example.org/{n}"),
                title: format!("Source {n} on {query}"),
                excerpt: format!("Excerpt {n} about {query}."),
            })
            .collect())
    }
}

pub fn answer(value: Value) -> String {
    format!("Here is the result.\n<answer>\n{value}\n</answer>")
}

pub fn seed_reply(descriptions: &[&str]) -> String {
    answer(Value::Array(
        descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| json!({"description": d, "priority": 8 - i, "type": "research"}))
            .collect(),
    ))
}

pub fn gap_reply(descriptions: &[&str]) -> String {
    answer(json!({
        "global_gaps": [],
        "suggested_tasks": descriptions
            .iter()
            .map(|d| json!({"description": d, "priority": 6}))
            .collect::<Vec<_>>()
    }))
}

pub fn controller(
    dir: &Path,
    llm: &Arc<ScriptedLLM>,
    retriever: &Arc<MockRetriever>,
    limits: Limits,
) -> Controller {
    ControllerBuilder::new()
        .generator(LlmGenerator::new(llm.clone()))
        .retriever(retriever.clone())
        .output_dir(dir.to_path_buf())
        .limits(limits)
        .build()
        .unwrap()
}
