use crate::Result;
use async_trait::async_trait;

mod openai;
pub use openai::OpenAI;

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    User(String),
    Assistant(String),
    System(String),
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
}

pub struct CompletionResponse {
    pub content: String,
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}
