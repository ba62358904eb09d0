use crate::answer::ParseError;
use async_openai::error::OpenAIError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("Http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected search response: {0}")]
    SearchResponseError(String),

    #[error("Unparsable answer: {0}")]
    ParseError(#[from] ParseError),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
}
