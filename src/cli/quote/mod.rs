//! Quote command - fetches quotes and prints them as JSON

use std::collections::BTreeMap;

use clap::Args;
use tracing::info;

use crate::domain::market::DataType;
use crate::infrastructure::metrics::init_metrics;

#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Data type: us-stock, jp-stock, mutual-fund or exchange-rate
    #[arg(long = "type", short = 't')]
    pub data_type: DataType,

    /// Symbols to fetch
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Skip the cache and fetch from the upstream
    #[arg(long)]
    pub refresh: bool,

    /// Print Prometheus metrics to stderr afterwards
    #[arg(long)]
    pub metrics: bool,
}

/// Run the quote command
pub async fn run(args: QuoteArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let metrics = if args.metrics { init_metrics() } else { None };

    let service = crate::create_service(&config).await?;
    let results = service
        .get_data(args.data_type, &args.symbols, args.refresh)
        .await?;

    info!(
        data_type = %args.data_type,
        requested = args.symbols.len(),
        returned = results.len(),
        "Quote request complete"
    );

    // Sorted for stable output
    let sorted: BTreeMap<_, _> = results.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    Ok(())
}
