use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::process::exit;
use std::sync::Arc;

use price_updater::api::create_oracle;
use price_updater::bot::PriceBot;
use price_updater::cli::Cli;
use price_updater::clock::SystemClock;
use price_updater::config::Config;
use price_updater::logging;
use price_updater::updater::create_updater;

async fn run(config: Config) -> Result<usize> {
    let oracle = create_oracle(&config, Arc::new(SystemClock)).context("Couldn't create oracle")?;
    info!("Oracle {} initialized.", oracle.name());

    let updater = create_updater(&config)
        .await
        .context("Couldn't create price updater")?;
    info!("Google Sheet updater initialized.");

    let bot = PriceBot::new(oracle, updater);
    let written = bot
        .run(&config.targets)
        .await
        .context("Couldn't update price")?;
    Ok(written)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.debug, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        exit(1);
    }

    let config = match Config::from_cli(&cli).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            exit(1);
        }
    };
    info!("Configuration loaded successfully.");

    match run(config).await {
        Ok(written) => info!("Finish updating price ({} pairs)", written),
        Err(e) => {
            error!("{:#}", e);
            exit(1);
        }
    }
}
