//! Cartloop CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write a default config file
//! - `chat`: Interactive or single-message sales chat
//! - `doctor`: Diagnose config and provider health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cartloop",
    about = "Cartloop: a sales agent that turns conversations into payment links",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CARTLOOP_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Chat with the sales agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Use the built-in demo catalog instead of the payment API
        #[arg(long)]
        offline: bool,
    },

    /// Diagnose configuration and provider health
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message, offline } => commands::chat::run(message, offline).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
