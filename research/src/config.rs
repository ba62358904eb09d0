use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: usize = 2;
pub const DEFAULT_MAX_TOTAL_TASKS: usize = 8;
pub const DEFAULT_MAX_NEW_TASKS_PER_ITER: usize = 2;
pub const DEFAULT_SIMILARITY_THRESHOLD: usize = 4;

/// Phrasings that tend to produce unbounded, overly broad research tasks.
pub fn default_blocked_keywords() -> Vec<String> {
    [
        "comprehensive",
        "assessment",
        "future prospects",
        "impact analysis",
        "conduct",
        "broad analysis",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn at_least_one() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

#[derive(Parser, Debug)]
#[command(name = "research", about = "Iterative research loop: decompose, retrieve, synthesize, report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a single topic and print the final report.
    Run {
        /// Topic to research; read from stdin when omitted.
        topic: Option<String>,
    },
    /// Serve the research endpoint over HTTP.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: String,
    },
}

/// Process-wide settings, built once in `main` and handed to the controller.
#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(long, env = "RESEARCH_MODEL", default_value = "gpt-4o", global = true)]
    pub model: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of any OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_API_BASE", global = true)]
    pub api_base: Option<String>,

    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true, global = true)]
    pub tavily_api_key: Option<String>,

    /// Run folders are created beneath this directory, one per topic.
    #[arg(
        long,
        env = "RESEARCH_OUTPUT_DIR",
        default_value = "model_output_data",
        global = true
    )]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub limits: Limits,

    #[command(flatten)]
    pub admission: AdmissionConfig,

    #[command(flatten)]
    pub timeouts: TimeoutConfig,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ITERATIONS,
        value_parser = at_least_one(),
        global = true
    )]
    pub max_iterations: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TOTAL_TASKS,
        value_parser = at_least_one(),
        global = true
    )]
    pub max_total_tasks: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_NEW_TASKS_PER_ITER, global = true)]
    pub max_new_tasks_per_iter: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_total_tasks: DEFAULT_MAX_TOTAL_TASKS,
            max_new_tasks_per_iter: DEFAULT_MAX_NEW_TASKS_PER_ITER,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    #[arg(
        long = "blocked-keyword",
        value_delimiter = ',',
        default_values_t = default_blocked_keywords(),
        global = true
    )]
    pub blocked_keywords: Vec<String>,

    /// Shared-word count at which a suggested task counts as a duplicate.
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD, global = true)]
    pub similarity_threshold: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            blocked_keywords: default_blocked_keywords(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[arg(long, default_value_t = 120, global = true)]
    pub generation_timeout_secs: u64,

    #[arg(long, default_value_t = 30, global = true)]
    pub retrieval_timeout_secs: u64,
}

impl TimeoutConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: 120,
            retrieval_timeout_secs: 30,
        }
    }
}
