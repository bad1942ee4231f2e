//! Licgate CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing::error;

mod commands;
mod config;
mod handlers;
mod logging;

use commands::Commands;
use config::LicgateConfig;
use handlers::Outcome;
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "licgate")]
#[command(author, version, about = "Cluster-bound license gate", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "LICGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LICGATE_LOG_FORMAT", value_enum, default_value_t, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_format);

    let config = LicgateConfig::load(cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Run { command } => handlers::run(&config, command).await?,
        Commands::Install { subject, key } => handlers::install(&config, subject, key).await?,
        Commands::Status { json } => handlers::status(&config, json).await?,
    };

    match outcome {
        Outcome::Exit(0) => Ok(()),
        Outcome::Exit(code) => std::process::exit(code),
        Outcome::Terminate(reason) => {
            error!(reason = %reason, exit_code = reason.exit_code(), "Terminating");
            std::process::exit(reason.exit_code())
        }
    }
}
