use crate::Result;
use crate::answer;
use crate::llm::{CompletionRequest, LLM, Message};
use async_trait::async_trait;
use schemars::{JsonSchema, schema_for};
use std::sync::Arc;

/// Input to a structured generation call.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub instructions: String,
    pub context: String,
}

impl GenerationRequest {
    pub fn new(instructions: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            context: context.into(),
        }
    }

    /// Appends the JSON schema of `T` to the instructions so the model knows
    /// the exact shape expected inside the answer block.
    pub fn with_schema<T: JsonSchema>(mut self) -> Result<Self> {
        let schema = serde_json::to_string_pretty(&schema_for!(T))?;
        self.instructions.push_str(
            "\n\nThe JSON inside the <answer> block must conform to this schema:\n",
        );
        self.instructions.push_str(&schema);
        Ok(self)
    }
}

/// Turns instructions plus context into one decoded JSON value.
#[async_trait]
pub trait ContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value>;
}

/// Generator backed by a chat model: instructions go in as the system
/// prompt, context as the user turn, and the reply is decoded from its
/// `<answer>` block.
pub struct LlmGenerator {
    llm: Arc<dyn LLM + Send + Sync>,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LLM + Send + Sync>) -> Arc<Self> {
        Arc::new(Self { llm })
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value> {
        let messages = [
            Message::System(request.instructions.clone()),
            Message::User(request.context.clone()),
        ];

        let response = self
            .llm
            .completion(CompletionRequest {
                messages: &messages,
            })
            .await?;

        tracing::debug!(chars = response.content.len(), "generation reply received");

        Ok(answer::decode(&response.content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentGenerator, GenerationRequest, LlmGenerator};
    use crate::llm::{CompletionRequest, CompletionResponse, LLM, Message};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct MockLLM;

    #[async_trait]
    impl LLM for MockLLM {
        async fn completion<'a>(
            &self,
            request: CompletionRequest<'a>,
        ) -> Result<CompletionResponse> {
            match request.messages {
                [Message::System(instructions), Message::User(context)] => {
                    if context == "garbage" {
                        return Ok(CompletionResponse {
                            content: "no structured output here".to_string(),
                        });
                    }
                    Ok(CompletionResponse {
                        content: format!(
                            "<answer>{}</answer>",
                            json!({"instructions": instructions, "context": context})
                        ),
                    })
                }
                _ => panic!("unexpected message sequence"),
            }
        }
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Shape {
        summary: String,
    }

    #[tokio::test]
    async fn test_generate_routes_messages() -> Result<()> {
        let generator = LlmGenerator::new(Arc::new(MockLLM));

        let value = generator
            .generate(&GenerationRequest::new("be brief", "solar panels"))
            .await?;

        assert_eq!(
            value,
            json!({"instructions": "be brief", "context": "solar panels"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_surfaces_parse_error() {
        let generator = LlmGenerator::new(Arc::new(MockLLM));

        let err = generator
            .generate(&GenerationRequest::new("be brief", "garbage"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_with_schema_appends_properties() -> Result<()> {
        let request = GenerationRequest::new("summarize", "").with_schema::<Shape>()?;

        assert!(request.instructions.starts_with("summarize"));
        assert!(request.instructions.contains("\"summary\""));
        Ok(())
    }
}
