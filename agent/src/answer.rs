//! Decoding of `<answer>...</answer>` wrapped JSON replies.
//!
//! Generation prompts ask the model to wrap its structured output in an
//! answer block. Only the first block is considered; ASCII control characters
//! are stripped before parsing since models routinely emit raw newlines and
//! tabs inside string literals.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use thiserror::Error;

static ANSWER_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<answer>(.*?)</answer>").expect("answer pattern is valid"));

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f]").expect("control pattern is valid"));

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no <answer> block in reply")]
    MissingAnswer { raw: String },

    #[error("answer block is not valid json: {source}")]
    InvalidJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// The text that failed to parse: the whole reply when no block was found,
    /// otherwise the cleaned block contents.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::MissingAnswer { raw } | ParseError::InvalidJson { raw, .. } => raw,
        }
    }

    /// Structured stand-in persisted in place of a value that could not be decoded.
    pub fn to_value(&self) -> Value {
        json!({
            "error": "parse_failed",
            "raw": self.raw(),
        })
    }
}

pub fn decode(reply: &str) -> Result<Value, ParseError> {
    let block = ANSWER_BLOCK
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ParseError::MissingAnswer {
            raw: reply.to_string(),
        })?;

    let cleaned = CONTROL_CHARS.replace_all(block.as_str().trim(), "");

    serde_json::from_str(&cleaned).map_err(|source| ParseError::InvalidJson {
        raw: cleaned.into_owned(),
        source,
    })
}
