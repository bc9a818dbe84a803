mod cli;
mod enrich;
mod httpconvert;
mod naming;
mod pages;
mod record;
mod testcase;
#[cfg(test)]
mod testutil;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Record(args) => record::run(args).await,
        Commands::Enrich(args) => enrich::run(args).await,
        Commands::GeneratePages(args) => pages::run(args).await,
        Commands::GenerateTest(args) => testcase::run(args).await,
        Commands::ConvertHttpTests(args) => httpconvert::run(args).await,
    }
}
