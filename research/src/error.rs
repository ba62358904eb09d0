use std::fmt;
use thiserror::Error;

/// Generation steps whose failure matters to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Seeding,
    GapDetection,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Seeding => write!(f, "task seeding"),
            Stage::GapDetection => write!(f, "gap detection"),
            Stage::Report => write!(f, "final report"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream generation failed during {stage}: {reason}")]
    UpstreamGeneration { stage: Stage, reason: String },

    #[error("Retrieval failed for task '{task}': {source}")]
    Retrieval {
        task: String,
        #[source]
        source: agent::Error,
    },

    #[error("Synthesis failed for task '{task}': {reason}")]
    Synthesis { task: String, reason: String },

    #[error("No evidence could be synthesized for any task")]
    NoEvidence,

    #[error("Capability error: {0}")]
    Capability(#[from] agent::Error),

    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Missing arg: {0}")]
    MissingArg(String),
}

impl Error {
    pub fn upstream(stage: Stage, err: impl fmt::Display) -> Self {
        Error::UpstreamGeneration {
            stage,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, Stage};

    #[test]
    fn test_task_failure_names_task() {
        let err = Error::Retrieval {
            task: "Map wind farms".into(),
            source: agent::Error::SearchResponseError("search returned status 503".into()),
        };
        assert_eq!(
            err.to_string(),
            "Retrieval failed for task 'Map wind farms': Unexpected search response: search returned status 503"
        );
    }

    #[test]
    fn test_upstream_message_names_stage() {
        let err = Error::upstream(Stage::Report, "no <answer> block in reply");
        assert_eq!(
            err.to_string(),
            "Upstream generation failed during final report: no <answer> block in reply"
        );
    }
}
