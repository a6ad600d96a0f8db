//! semacheck CLI application
//!
//! Runs the semaphore dependency and completion-polling scenarios against the
//! simulated device and reports pass, fail and skip verdicts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use semacheck_cli::commands::{InfoCommand, ListCommand, RunCommand};
use semacheck_cli::config::CliConfig;
use semacheck_cli::exit::{EXIT_SUCCESS, EXIT_USAGE};
use semacheck_runtime::SharedRuntime;
use semacheck_sim::SimRuntime;
use semacheck_verifier::{LogFormat, LogLevel, RunOverrides};
use tracing::error;

/// semacheck - semaphore conformance checker
#[derive(Parser)]
#[command(name = "semacheck")]
#[command(about = "Semaphore dependency and completion-polling conformance checker")]
#[command(long_about = r#"
semacheck runs binary semaphore conformance scenarios (signal/wait ordering,
cross-queue and cross-context use, external handle export and import, and
error reporting) against a simulated OpenCL-style device.

Examples:
  # List the scenarios
  semacheck list

  # Run everything on device 0
  semacheck run

  # Run the ordering scenarios against a driver that keeps waits signaled
  semacheck run --filter order_ --quirk wait-keeps-payload

  # Machine-readable report
  semacheck run --format json
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List scenario names and descriptions
    #[command(alias = "ls")]
    List(ListCommand),

    /// Show device capabilities
    Info(InfoCommand),

    /// Run the scenarios
    Run(RunCommand),

    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("error: {e}");

            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            EXIT_USAGE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply(&RunOverrides {
        log_level: cli.log_level,
        log_format: cli.log_format,
        ..Default::default()
    });
    if let Some(Commands::Run(cmd)) = &cli.command {
        cmd.apply(&mut config);
    }
    config.validate()?;

    setup_logging(config.run.log_level, config.run.log_format);

    match cli.command {
        Some(Commands::List(cmd)) => cmd.execute().map(|()| EXIT_SUCCESS),
        Some(Commands::Info(cmd)) => cmd.execute(&start_runtime(&config)?).map(|()| EXIT_SUCCESS),
        Some(Commands::Run(cmd)) => cmd.execute(&config),
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
            Ok(EXIT_SUCCESS)
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
            Ok(EXIT_SUCCESS)
        }
    }
}

fn start_runtime(config: &CliConfig) -> Result<SharedRuntime> {
    let runtime =
        SimRuntime::new(config.device.clone()).context("Failed to start simulated device")?;
    Ok(Arc::new(runtime))
}

/// Logs go to stderr so that `--format json` output stays parseable.
fn setup_logging(level: LogLevel, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init();
        }
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}
