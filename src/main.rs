use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use tagmill::cli::{Cli, Command, discover_jobs};
use tagmill::invoker::{CredentialHealth, check_credentials};
use tagmill::{
    BatchScheduler, CancellationGate, ConsoleProgress, EngineConfig, Invoker, ProviderClient,
    RetryController, SelectorPool,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load()?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(delay) = cli.delay {
        config.base_delay_secs = delay;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }

    match cli.command {
        Command::Check => check(&config).await,
        Command::Run { input } => run(&config, &input).await,
    }
}

async fn check(config: &EngineConfig) -> Result<()> {
    if config.credentials.is_empty() {
        println!("No credentials configured. Add them to tagmill.toml or set TAGMILL_API_KEY.");
        return Ok(());
    }
    let provider = ProviderClient::with_base_url(config.api_base.clone());
    for report in check_credentials(&provider, &config.credentials).await {
        let label = match report.health {
            CredentialHealth::Usable => "usable",
            CredentialHealth::RateLimited => "rate limited (valid)",
            CredentialHealth::Invalid => "invalid",
        };
        match report.detail {
            Some(detail) => println!("  {} {label}: {detail}", report.key_tail),
            None => println!("  {} {label}", report.key_tail),
        }
    }
    Ok(())
}

async fn run(config: &EngineConfig, input: &std::path::Path) -> Result<()> {
    let jobs = discover_jobs(input)?;
    if jobs.is_empty() {
        println!("No supported files found in {}", input.display());
        return Ok(());
    }

    let pool = SelectorPool::new(
        config.credentials.clone(),
        config.models.clone(),
        config.fallback_models.clone(),
        config.selection_mode(),
    )?;

    let gate = Arc::new(CancellationGate::new());
    {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                gate.trip();
            }
        });
    }

    let provider = ProviderClient::with_base_url(config.api_base.clone());
    let controller = RetryController::new(
        pool.clone(),
        Invoker::new(provider, config.max_keywords),
        tagmill::RetryPolicy::default(),
        Arc::clone(&gate),
    );

    let progress = Arc::new(ConsoleProgress::start(jobs.len()));
    let scheduler = BatchScheduler::new(
        controller,
        pool,
        gate,
        progress.clone(),
        config.schedule_settings(),
    );

    let summary = scheduler.run(jobs).await?;
    progress.finish(&summary);
    Ok(())
}
