use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validation::validate_price;

/// A single instrument quote as reported by an oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub symbol: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
    pub base_currency: String,
    pub price: f64,
}

impl QuoteItem {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        last_updated: DateTime<Utc>,
        base_currency: impl Into<String>,
        price: f64,
    ) -> Result<Self> {
        let symbol = symbol.into();
        validate_price(price).map_err(|e| match e {
            Error::UpstreamDecode(msg) => Error::UpstreamDecode(format!("{}: {}", symbol, msg)),
            other => other,
        })?;

        Ok(Self {
            symbol,
            name: name.into(),
            last_updated,
            base_currency: base_currency.into(),
            price,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPair {
    pub base_symbol: String,
    pub quote_symbol: String,
    pub price: f64,
    pub updated_time: DateTime<Utc>,
}

impl TradingPair {
    /// `BTC/USD` style label used in the sheet.
    pub fn label(&self) -> String {
        format!("{}/{}", self.base_symbol, self.quote_symbol)
    }
}

impl From<QuoteItem> for TradingPair {
    fn from(item: QuoteItem) -> Self {
        TradingPair {
            base_symbol: item.symbol,
            quote_symbol: item.base_currency,
            price: item.price,
            updated_time: item.last_updated,
        }
    }
}

pub fn create_trading_pairs(items: Vec<QuoteItem>) -> Vec<TradingPair> {
    items.into_iter().map(TradingPair::from).collect()
}
