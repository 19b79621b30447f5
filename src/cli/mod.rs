//! CLI module for the market data gateway
//!
//! Provides subcommands:
//! - `quote`: fetch quotes through cache, upstream and fallback
//! - `stats`: cache table statistics
//! - `cleanup`: purge expired cache entries

pub mod cleanup;
pub mod quote;
pub mod stats;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Market Data Gateway - cached, resilient access to market quotes
#[derive(Parser)]
#[command(name = "market-data-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch quotes for one data type
    Quote(quote::QuoteArgs),

    /// Print cache statistics as JSON
    Stats,

    /// Remove expired cache entries
    Cleanup,
}

/// Loads `.env` and configuration, then installs logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
