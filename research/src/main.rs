mod admission;
mod config;
mod controller;
mod error;
mod model;
mod prompts;
mod server;
mod storage;
mod task;

#[cfg(test)]
mod testing;

use agent::{LlmGenerator, Tavily, llm::OpenAI};
use clap::Parser;
use config::{Cli, Command, Config};
use controller::{Controller, ControllerBuilder};
use std::io::Write;
use std::sync::Arc;

pub use error::{Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let controller = build_controller(&cli.config)?;

    match cli.command {
        Command::Run { topic } => {
            let topic = match topic {
                Some(topic) => topic,
                None => read_topic()?,
            };
            let report = controller.run(&topic).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve { addr } => server::serve(Arc::new(controller), &addr).await?,
    }

    Ok(())
}

fn build_controller(config: &Config) -> Result<Controller> {
    let llm = match &config.openai_api_key {
        Some(key) => OpenAI::with_endpoint(config.model.clone(), key, config.api_base.as_deref()),
        None => OpenAI::new(config.model.clone()),
    };

    let tavily_key = config.tavily_api_key.clone().ok_or(Error::MissingArg(
        "TAVILY_API_KEY is required for evidence retrieval".to_string(),
    ))?;

    ControllerBuilder::new()
        .generator(LlmGenerator::new(llm))
        .retriever(Tavily::new(tavily_key)?)
        .output_dir(config.output_dir.clone())
        .limits(config.limits.clone())
        .admission(config.admission.clone())
        .timeouts(config.timeouts.clone())
        .build()
}

fn read_topic() -> Result<String> {
    print!("Enter research topic: ");
    std::io::stdout().flush()?;

    let mut topic = String::new();
    std::io::stdin().read_line(&mut topic)?;
    Ok(topic.trim().to_string())
}
