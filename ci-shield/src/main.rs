use ci_status::config::Credentials;
use clap::{Args, Parser};
use config::{Config, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod config;

const METRICS_PREFIX: &str = "ci_shield";

#[derive(Parser)]
#[command(version, about = "Serves shields.io badges for GitHub Actions runs")]
enum CliCommand {
    /// Run the badge server.
    Serve(ConfigArgs),
    /// Load and validate the config file and environment, then exit.
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Every setting has a default when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Credentials(#[from] ci_status::config::ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] ci_status::config::ValidationError),
    #[error("invalid sentry DSN: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Server(#[from] ci_status::errors::ServerError),
}

fn main() {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::Serve(args) => serve(args),
        CliCommand::CheckConfig(args) => check_config(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn serve(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::load(args.config.as_deref())?;

    // Sentry must be initialised before the runtime starts its threads.
    let _sentry = init_logging(config.common.logging.as_ref())?;
    init_metrics(config.common.metrics.as_ref())?;

    let credentials = Credentials::from_env()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(ci_status::run(config.ci_status, credentials))?;

    Ok(())
}

fn check_config(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::load(args.config.as_deref())?;
    config.ci_status.validate()?;
    if let Some(logging) = &config.common.logging {
        logging.sentry_dsn.parse::<sentry::types::Dsn>()?;
    }
    let credentials = Credentials::from_env()?;

    let listener = &config.ci_status.listener;
    println!("listener: {}:{}", listener.host, listener.port);
    println!("github api: {}", config.ci_status.github.api_url);
    if credentials.allow_list.is_empty() {
        println!("allowed owners: all");
    } else {
        println!(
            "allowed owners: {}",
            credentials.allow_list.owners().join(", ")
        );
    }
    match &config.common.metrics {
        Some(m) => println!("metrics: statsd {}:{}", m.statsd_host, m.statsd_port),
        None => println!("metrics: disabled"),
    }

    Ok(())
}

fn init_logging(
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = match logging {
        Some(logging) => {
            let dsn = logging.sentry_dsn.parse::<sentry::types::Dsn>()?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    Ok(guard)
}

fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), CliError> {
    let Some(config) = config else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(ci_status::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
