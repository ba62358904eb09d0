use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_RESULTS: usize = 5;
pub const MAX_EXCERPT_CHARS: usize = 1200;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// One ranked search hit handed to synthesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,
    pub title: String,
    pub excerpt: String,
}

/// Fetches a small ranked evidence list for a query. An empty list is a
/// valid answer.
#[async_trait]
pub trait Retriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Evidence>>;
}

pub struct Tavily {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl Tavily {
    pub fn new(api_key: String) -> Result<Arc<Self>> {
        Self::with_endpoint(api_key, TAVILY_ENDPOINT.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("research-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Arc::new(Self {
            client,
            api_key,
            endpoint,
        }))
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl From<SearchHit> for Evidence {
    fn from(hit: SearchHit) -> Self {
        Self {
            source: hit.url,
            title: hit.title,
            excerpt: truncate_chars(&hit.content, MAX_EXCERPT_CHARS),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn into_evidence(response: SearchResponse) -> Vec<Evidence> {
    response
        .results
        .into_iter()
        .take(MAX_RESULTS)
        .map(Evidence::from)
        .collect()
}

#[async_trait]
impl Retriever for Tavily {
    async fn retrieve(&self, query: &str) -> Result<Vec<Evidence>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                search_depth: "advanced",
                max_results: MAX_RESULTS,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SearchResponseError(format!(
                "search returned status {status}"
            )));
        }

        let evidence = into_evidence(response.json::<SearchResponse>().await?);
        tracing::debug!(query, hits = evidence.len(), "search completed");

        Ok(evidence)
    }
}
