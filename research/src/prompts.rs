use crate::model::{FinalReport, GapReport, SynthesisEntry, SynthesisMap, TaskDraft};
use agent::{Evidence, GenerationRequest, Result};
use serde_json::{Value, json};

pub const SEED_PROMPT: &str = include_str!("prompts/seed.md");
pub const SYNTHESIS_PROMPT: &str = include_str!("prompts/synthesize.md");
pub const GAP_PROMPT: &str = include_str!("prompts/gaps.md");
pub const REPORT_PROMPT: &str = include_str!("prompts/report.md");

pub fn seed(topic: &str) -> Result<GenerationRequest> {
    GenerationRequest::new(SEED_PROMPT, topic).with_schema::<Vec<TaskDraft>>()
}

pub fn synthesis(description: &str, evidence: &[Evidence]) -> Result<GenerationRequest> {
    let context = serde_json::to_string_pretty(&json!({
        "task": description,
        "evidence": evidence,
    }))?;

    GenerationRequest::new(SYNTHESIS_PROMPT, context).with_schema::<SynthesisEntry>()
}

pub fn gaps(synthesis: &SynthesisMap) -> Result<GenerationRequest> {
    let context = serde_json::to_string_pretty(synthesis)?;
    GenerationRequest::new(GAP_PROMPT, context).with_schema::<GapReport>()
}

pub fn report(
    topic: &str,
    synthesis: &SynthesisMap,
    gaps: Option<&GapReport>,
) -> Result<GenerationRequest> {
    let context = serde_json::to_string_pretty(&json!({
        "topic": topic,
        "synthesized_results": synthesis,
        "gap_analysis": gaps.map_or(Value::Null, |g| json!(g)),
    }))?;

    GenerationRequest::new(REPORT_PROMPT, context).with_schema::<FinalReport>()
}
