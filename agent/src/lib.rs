pub mod answer;
mod error;
pub mod generate;
pub mod llm;
pub mod search;

use std::future::Future;
use std::time::Duration;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use generate::{ContentGenerator, GenerationRequest, LlmGenerator};
pub use search::{Evidence, Retriever, Tavily};

/// Runs a capability call under a deadline; an elapsed deadline surfaces as
/// [`Error::Timeout`] like any other call failure.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(limit))?
}
