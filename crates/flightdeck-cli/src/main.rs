//! flightdeck: deploy a CI service onto AWS and keep it up to date.
//!
//! # Usage
//!
//! ```text
//! flightdeck deploy ci --region eu-west-1 --domain ci.example.com
//! flightdeck deploy ci --self-update
//! eval "$(flightdeck info --env ci)"
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod adapters;
mod commands;

const DEFAULT_LOG_FILTER: &str = "info,flightdeck=debug";

#[derive(Parser)]
#[command(
    name = "flightdeck",
    about = "Flightdeck: CI service deployments on AWS",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file with deploy defaults, paths and tool names.
    #[arg(long, global = true, default_value = "flightdeck.toml")]
    config: PathBuf,

    /// State database (overrides [paths].state).
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a new CI service, or update an existing one.
    Deploy(commands::deploy::DeployCommand),
    /// Show connection details of an existing deployment.
    Info(commands::info::InfoCommand),
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // stdout is reserved for operator output (`info --env` is eval'd).
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = flightdeck_core::FlightdeckConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Deploy(cmd) => commands::deploy::run(cmd, &settings, cli.state).await,
        Commands::Info(cmd) => commands::info::run(cmd, &settings, cli.state),
    }
}
