use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod api;
mod config;
mod logging;
mod node;
mod peers;

use config::NodeConfig;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agora - validator-side tournament engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the validator node (worker, scheduler, admin API)
    Start,
    /// Validate the configuration and print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Start => {
            logging::init_logging(&config.logging)?;
            info!(
                version = env!("CARGO_PKG_VERSION"),
                schedule_mode = ?config.tournament.schedule_mode,
                networks = ?config.tournament.networks,
                "🚀 agora node starting"
            );
            let node = node::AgoraNode::build(config)?;
            node.run().await
        }
        Commands::CheckConfig => {
            // Validation already happened in load(); print the effective
            // config for operators.
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
