//! `opendeps`: work with OpenDeps manifests.
//!
//! - `mock`: stage a manifest's specs and serve them from a containerized mock engine
//! - `test`: check that each dependency's availability endpoint responds
//! - `scaffold`: generate a manifest from a directory of `OpenAPI` documents
//! - `validate`: check a manifest against the OpenDeps JSON schema

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "opendeps")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "OPENDEPS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Config file [default: $XDG_CONFIG_HOME/opendeps/config.json]
    #[arg(long, global = true, env = "OPENDEPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a mock server for every dependency in a manifest
    Mock(commands::mock::MockArgs),

    /// Test the availability of dependencies
    Test(commands::test::TestArgs),

    /// Generate a manifest from the OpenAPI documents in a directory
    Scaffold(commands::scaffold::ScaffoldArgs),

    /// Validate a manifest against the OpenDeps schema
    Validate(commands::validate::ValidateArgs),
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    // Logs go to stderr; stdout carries the mock engine's own output.
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(ansi)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::resolve_config(cli.config.as_deref())?;
    match cli.command {
        Command::Mock(args) => commands::mock::run(args, &config).await,
        Command::Test(args) => commands::test::run(args).await,
        Command::Scaffold(args) => commands::scaffold::run(&args),
        Command::Validate(args) => commands::validate::run(args, &config).await,
    }
}
