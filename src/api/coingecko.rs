use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;

use crate::api::{build_url, check_status, decode_json, request_failed, sort_quote_items, Oracle, Query};
use crate::error::{Error, Result};
use crate::models::QuoteItem;
use crate::validation::validate_targets;

const API_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const MARKETS_ENDPOINT: &str = "coins/markets";
const API_KEY_HEADER: &str = "X-CG-Pro-API-Key";
const IDS_QUERY: &str = "ids";
const VS_CURRENCY_QUERY: &str = "vs_currency";
const VS_CURRENCY: &str = "usd";
const BASE_CURRENCY: &str = "USD";
const SOURCE: &str = "CoinGecko";

#[derive(Debug, Deserialize, Clone)]
struct CoinGeckoMarketItem {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

impl CoinGeckoMarketItem {
    fn into_quote_item(self) -> Result<QuoteItem> {
        let price = self.current_price.ok_or_else(|| {
            Error::UpstreamDecode(format!("{}: missing current_price for {}", SOURCE, self.id))
        })?;
        let last_updated = self.last_updated.ok_or_else(|| {
            Error::UpstreamDecode(format!("{}: missing last_updated for {}", SOURCE, self.id))
        })?;

        QuoteItem::new(
            self.symbol.to_uppercase(),
            self.name,
            last_updated,
            BASE_CURRENCY,
            price,
        )
    }
}

/// CoinGecko silently drops unknown ids from a markets response.
fn ensure_all_targets_found(targets: &[String], markets: &[CoinGeckoMarketItem]) -> Result<()> {
    let found: HashSet<&str> = markets.iter().map(|m| m.id.as_str()).collect();
    let missing: Vec<&str> = targets
        .iter()
        .map(String::as_str)
        .filter(|id| !found.contains(id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::UpstreamDecode(format!(
            "{}: no market data for ids={}",
            SOURCE,
            missing.join(",")
        )))
    }
}

/// Quotes crypto prices in USD from the CoinGecko markets endpoint.
///
/// Targets are CoinGecko coin ids (`bitcoin`, `ethereum`), not ticker symbols.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn markets_url(&self, targets: &[String]) -> Result<String> {
        build_url(
            &format!("{}/{}", self.base_url, MARKETS_ENDPOINT),
            &[
                Query::new(IDS_QUERY, targets.join(",")),
                Query::new(VS_CURRENCY_QUERY, VS_CURRENCY),
            ],
        )
    }
}

#[async_trait]
impl Oracle for CoinGeckoClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_quotes(&self, targets: &[String]) -> Result<Vec<QuoteItem>> {
        validate_targets(targets)?;
        let url = self.markets_url(targets)?;
        debug!("Requesting {} markets: {}", SOURCE, url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| request_failed(SOURCE, e))?;
        let response = check_status(response, SOURCE)?;
        let markets: Vec<CoinGeckoMarketItem> = decode_json(response, SOURCE).await?;
        ensure_all_targets_found(targets, &markets)?;

        let mut items = markets
            .into_iter()
            .map(CoinGeckoMarketItem::into_quote_item)
            .collect::<Result<Vec<_>>>()?;
        sort_quote_items(&mut items);

        info!("Fetched {} quotes from {}", items.len(), SOURCE);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_markets_url() {
        let client = CoinGeckoClient::new(Client::new(), None).with_base_url("http://localhost:1234/");
        let url = client
            .markets_url(&["ethereum".to_string(), "bitcoin".to_string()])
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:1234/coins/markets?ids=ethereum%2Cbitcoin&vs_currency=usd"
        );
    }

    #[test]
    fn test_market_item_into_quote_item() {
        let raw = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 61234.5,
            "market_cap": 1154000000000,
            "last_updated": "2021-10-31T06:04:07.521Z"
        }"#;
        let item: CoinGeckoMarketItem = serde_json::from_str(raw).unwrap();

        let quote = item.into_quote_item().unwrap();

        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.name, "Bitcoin");
        assert_eq!(quote.base_currency, "USD");
        assert_eq!(quote.price, 61234.5);
        assert_eq!(
            quote.last_updated,
            Utc.with_ymd_and_hms(2021, 10, 31, 6, 4, 7).unwrap()
                + chrono::Duration::milliseconds(521)
        );
    }

    fn market(id: &str) -> CoinGeckoMarketItem {
        CoinGeckoMarketItem {
            id: id.to_string(),
            symbol: id[..3].to_string(),
            name: id.to_string(),
            current_price: Some(1.0),
            last_updated: Some(Utc.with_ymd_and_hms(2021, 10, 31, 6, 4, 7).unwrap()),
        }
    }

    #[test]
    fn test_ensure_all_targets_found() {
        let targets = vec!["bitcoin".to_string(), "ethereum".to_string()];

        assert!(ensure_all_targets_found(&targets, &[market("ethereum"), market("bitcoin")]).is_ok());
        assert!(matches!(
            ensure_all_targets_found(&targets, &[market("bitcoin")]),
            Err(Error::UpstreamDecode(msg)) if msg.ends_with("ids=ethereum")
        ));
        assert!(matches!(
            ensure_all_targets_found(&targets, &[]),
            Err(Error::UpstreamDecode(msg)) if msg.ends_with("ids=bitcoin,ethereum")
        ));
    }

    #[test]
    fn test_market_item_without_price_is_decode_error() {
        let raw = r#"{"id": "dead", "symbol": "dead", "name": "Dead", "current_price": null,
                      "last_updated": "2021-10-31T06:04:07.521Z"}"#;
        let item: CoinGeckoMarketItem = serde_json::from_str(raw).unwrap();

        assert!(matches!(item.into_quote_item(), Err(Error::UpstreamDecode(_))));
    }
}
