//! AutoTest service entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod events;
mod handlers;

use commands::{Commands, ConfigCommands};

#[derive(Parser)]
#[command(name = "autotest")]
#[command(author, version, about = "Automated grading for course repositories", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve { config } => handlers::serve(&config).await?,
        Commands::Grade { config, job } => handlers::grade(&config, &job).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show { config } => handlers::show_config(&config)?,
        },
        Commands::Schema => handlers::schema()?,
    }

    Ok(())
}
