//! CLI command definitions.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Wait for a valid license, then enforce it for as long as the process runs
    Run {
        /// Service command to start once licensed and stop when the license lapses
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Validate a license and store it
    Install {
        /// Identity the license is issued to
        #[arg(short, long)]
        subject: String,

        /// Encrypted license key
        #[arg(short, long, env = "LICGATE_LICENSE_KEY", hide_env_values = true)]
        key: String,
    },

    /// Show the stored license
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}
