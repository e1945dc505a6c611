//! `checkout-cli`: drives the cart, pricing and checkout core against a live
//! storefront backend.
//!
//! Configuration comes from `CHECKOUT_*` environment variables (or `.env`),
//! logging is controlled by `RUST_LOG`. Ctrl-C aborts the running command.

mod cli;
mod context;
mod payment;

use anyhow::Result;
use app_config::AppConfig;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Initialize the tracing subscriber for logging, `info` unless `RUST_LOG` says otherwise.
fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger();

    let config = AppConfig::load()?;
    info!(api = %config.api_base_url, "Configuration loaded");

    tokio::select! {
        res = cli.run(config) => res,
        _ = signal::ctrl_c() => {
            warn!("Interrupted");
            Ok(())
        }
    }
}
