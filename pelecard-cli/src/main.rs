//! Pelecard command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Receive webhooks on the configured host and port
//! pelecard serve
//!
//! # Call an endpoint with the configured terminal
//! pelecard call charge --data '{"amount": 1000, "currency": "ILS", "token": "..."}'
//!
//! # List endpoints, show webhook setup
//! pelecard endpoints
//! pelecard webhook-info --base-url https://shop.example
//! ```
//!
//! # Environment Variables
//!
//! - `PELECARD_CONFIG` - Path to TOML configuration file (default: `pelecard.toml`)
//! - `PELECARD_*` - Configuration overrides, see [`pelecard::config`]
//! - `HOST` / `PORT` - Override the listener address
//! - `RUST_LOG` - Log level filter (default: `info`)
//!
//! A `.env` file in the working directory is loaded first.

mod cli;
mod commands;

use std::io::{self, Write};

use clap::Parser;
use pelecard::config::PelecardConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::CommandError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("pelecard failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = PelecardConfig::load_from(&cli.config)?;
    tracing::debug!(
        environment = %config.environment,
        base_url = config.base_url(),
        "Loaded configuration"
    );

    let mut out = io::stdout();
    match cli.command {
        Command::Serve { host, port } => commands::serve(&config, host, port).await?,
        Command::Call {
            endpoint,
            data,
            throw,
        } => commands::call(&config, &endpoint, &data, throw, &mut out).await?,
        Command::Endpoints => commands::endpoints(&mut out)?,
        Command::WebhookInfo { base_url } => {
            commands::webhook_info(&config, base_url.as_deref(), &mut out)?;
        }
    }
    out.flush()?;
    Ok(())
}
