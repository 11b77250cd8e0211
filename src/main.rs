use clap::Parser;
use log_triage::config::{Cli, Config};
use log_triage::implementations::LLMInferenceService;
use log_triage::loghub_loader::LogHubDatasetLoader;
use log_triage::pipeline::Pipeline;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("log_triage=info")),
        )
        .init();

    let config = Config::from_cli(Cli::parse());
    config.log_config();

    let service = match LLMInferenceService::new(config.llm.clone()) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("❌ LLM configuration error: {:#}", e);
            tracing::error!("💡 Set LLM_PROVIDER, LLM_MODEL and LLM_API_KEY or OLLAMA_ENDPOINT");
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Starting {} log triage", config.source);
    let dataset = LogHubDatasetLoader::new(&config.dataset_dir, &config.log_file);
    let outcome = Pipeline::new(&config, &service).run(&dataset).await;

    if let Some(evaluation) = &outcome.evaluation {
        info!(
            "📊 Score {:.1}/{:.1} over {} aligned lines",
            evaluation.metrics.score,
            evaluation.metrics.max_score,
            evaluation.metrics.samples
        );
    }

    if outcome.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
