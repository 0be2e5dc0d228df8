use log::info;

use crate::api::Oracle;
use crate::error::Result;
use crate::models::create_trading_pairs;
use crate::updater::Updater;

/// One fetch-transform-write run: quotes from an oracle end up as trading pairs in an updater.
pub struct PriceBot {
    oracle: Box<dyn Oracle>,
    updater: Box<dyn Updater>,
}

impl PriceBot {
    pub fn new(oracle: Box<dyn Oracle>, updater: Box<dyn Updater>) -> Self {
        Self { oracle, updater }
    }

    /// Fetches every target and writes them. Nothing is written if the fetch fails.
    /// Returns the number of pairs written.
    pub async fn run(&self, targets: &[String]) -> Result<usize> {
        info!("Fetching {} quotes from {}", targets.len(), self.oracle.name());
        let quote_items = self.oracle.fetch_quotes(targets).await?;

        let trading_pairs = create_trading_pairs(quote_items);
        for pair in &trading_pairs {
            info!("{} = {} ({})", pair.label(), pair.price, pair.updated_time);
        }

        self.updater.update_prices(&trading_pairs).await?;
        Ok(trading_pairs.len())
    }
}
