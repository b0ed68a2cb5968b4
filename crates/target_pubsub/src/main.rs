use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use target_pubsub::{
    spawn_usage_stats, ConfigError, PubSubConnection, PubSubPublisher, PublishSink, Router,
    StateValue, TargetConfig, TargetError,
};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "target-pubsub")]
#[command(version, about = "Publish Singer tap output to Google Cloud Pub/Sub")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log filter such as `info`, `debug` or `target_pubsub=trace`. Overrides `log_level`
    /// from the config file.
    #[arg(long)]
    loglevel: Option<String>,
}

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid log level `{level}`: {message}")]
    LogLevel { level: String, message: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Run(#[from] TargetError),
    #[error("failed to encode state: {0}")]
    State(#[from] serde_json::Error),
    #[error("failed to write state to stdout: {0}")]
    Stdout(#[from] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = TargetConfig::load(&cli.config);

    let level = cli
        .loglevel
        .clone()
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    if let Err(err) = init_logging(&level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let result = match config {
        Ok(config) => run(config).await,
        Err(err) => Err(err.into()),
    };
    match result {
        Ok(()) => {
            debug!("exiting normally");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout is reserved for the state line.
fn init_logging(level: &str) -> Result<(), Error> {
    let filter = EnvFilter::try_new(level).map_err(|e| Error::LogLevel {
        level: level.to_string(),
        message: e.to_string(),
    })?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
    Ok(())
}

async fn run(config: TargetConfig) -> Result<(), Error> {
    if !config.disable_collection {
        info!(
            "Sending version information to singer.io. To disable sending anonymous usage data, \
             set the config parameter \"disable_collection\" to true"
        );
        spawn_usage_stats(env!("CARGO_PKG_VERSION"));
    }

    let connection = PubSubConnection::resolve(&config)?;
    debug!(?connection, "resolved Pub/Sub connection");
    let publisher = PubSubPublisher::new(connection)?;
    let sink = PublishSink::new(publisher, config.topic.clone());

    let mut router = Router::new(sink, config.router_options());
    let state = router.run(tokio::io::stdin()).await?;
    emit_state(&state)
}

fn emit_state(state: &StateValue) -> Result<(), Error> {
    let line = state.to_json_line()?;
    debug!("emitting state {line}");
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
