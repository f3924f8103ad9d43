//! Shine sniffer binary.
//!
//! # Usage
//!
//! ```bash
//! # Capture with the default config path
//! shine-sniffer capture
//!
//! # Explicit config and verbose decoding
//! shine-sniffer capture --config sniffer.toml --log-level debug
//! ```

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Passive sniffer for the Shine game protocol
#[derive(Parser, Debug)]
#[command(name = "shine-sniffer")]
#[command(about = "Reconstructs Shine protocol messages from live capture")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture and decode traffic until interrupted
    Capture {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "sniffer.toml")]
        config: PathBuf,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Capture { config, log_level } => {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&log_level));
            tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

            tracing::info!(config = %config.display(), "shine sniffer starting");

            let config = Config::from_path(&config)?;
            app::capture(config).await
        },
    }
}
