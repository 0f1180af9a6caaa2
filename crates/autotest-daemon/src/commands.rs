//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Process push and comment events from stdin, one JSON object per line
    Serve {
        /// Path to the YAML config
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Grade a single job and print its result
    Grade {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON job descriptor
        #[arg(long)]
        job: PathBuf,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print the JSON schema grading containers write their report against
    Schema,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration with secrets redacted
    Show {
        #[arg(short, long)]
        config: PathBuf,
    },
}
