//! Coordinator binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabletkv::{common::CoordinatorConfig, Coordinator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tabletkv-coord")]
#[command(about = "tabletkv cluster coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator
    Serve {
        /// Bind address for the RPC endpoint
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: String,

        /// Durable coordinator log file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Configuration file (JSON); CLI arguments take priority
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, log, config } => {
            let mut coord_config = match config {
                Some(path) => CoordinatorConfig::from_file(path)?,
                None => CoordinatorConfig::default(),
            };
            if bind != "0.0.0.0:5000" {
                coord_config.bind_addr = bind.parse()?;
            }
            if log.is_some() {
                coord_config.log_path = log;
            }
            coord_config.validate()?;

            Coordinator::new(coord_config).serve().await?;
        }
    }

    Ok(())
}
