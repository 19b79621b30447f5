use clap::Parser;
use market_data_gateway::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Quote(args) => cli::quote::run(args).await,
        Command::Stats => cli::stats::run().await,
        Command::Cleanup => cli::cleanup::run().await,
    }
}
