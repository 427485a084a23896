//! cornfield is a CLI tool to deploy the Corn lending suite, and seed it when running locally.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.load_config()?;

    if cli.dry_run {
        if cli.reset {
            tracing::warn!("--reset has no effect with --dry-run");
        }
        println!("{}", config.dry_run()?);
        return Ok(());
    }

    let summary = config.deploy(cli.reset).await?;
    println!("{summary}");

    Ok(())
}
