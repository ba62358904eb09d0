use crate::llm;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, Role,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Chat completion client for OpenAI or any endpoint speaking the same API
/// (Groq, vLLM, llama.cpp server, ...).
pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    /// Uses `OPENAI_API_KEY` / `OPENAI_BASE_URL` from the environment.
    pub fn new(model: String) -> Arc<Self> {
        Arc::new(Self {
            model,
            client: Client::new(),
        })
    }

    pub fn with_endpoint(model: String, api_key: &str, api_base: Option<&str>) -> Arc<Self> {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Arc::new(Self {
            model,
            client: Client::with_config(config),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Assistant(msg) => Ok(ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.clone(),
                    ))
                    .build()?,
            )),
        }
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let completion = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(
                request
                    .messages
                    .iter()
                    .map(ChatCompletionRequestMessage::try_from)
                    .collect::<Result<Vec<_>>>()?,
            )
            .build()?;

        let res = self.client.chat().create(completion).await?;

        let choice = res
            .choices
            .first()
            .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

        if choice.message.role != Role::Assistant {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let content = choice
            .message
            .content
            .as_ref()
            .ok_or(Error::LLMResponseError("content is empty".to_string()))?;

        Ok(llm::CompletionResponse {
            content: content.clone(),
        })
    }
}
