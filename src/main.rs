use clap::Parser;
use worksheet_rdf::{AppConfig, CliArgs, LoggingConfig, PublishRun, init_logging, run, shutdown_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = AppConfig::from_args(cli)?;

    // Fail fast before anything is written
    config.validate()?;

    let result = run(config).await;
    shutdown_telemetry();
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result.run.to_response())?);
    if let Some(mapping) = &result.mapping {
        tracing::debug!(path = %mapping.path.display(), sha256 = %mapping.sha256, "mapping exported");
    }

    match result.run {
        PublishRun::Done(_) => Ok(()),
        PublishRun::Aborted(aborted) => anyhow::bail!("publish aborted: {}", aborted.message),
    }
}
