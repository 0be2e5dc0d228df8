use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::{build_url, decode_json, request_failed, sort_quote_items, Oracle, Query};
use crate::error::{Error, Result};
use crate::models::QuoteItem;
use crate::validation::validate_targets;

const API_BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1";
const QUOTES_ENDPOINT: &str = "cryptocurrency/quotes/latest";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";
const SYMBOL_QUERY: &str = "symbol";
const CONVERT_QUERY: &str = "convert";
const BASE_CURRENCY: &str = "USD";
const SOURCE: &str = "CoinMarketCap";

#[derive(Debug, Deserialize)]
struct CMCResponse {
    status: CMCStatus,
    data: Option<HashMap<String, CMCToken>>,
}

#[derive(Debug, Deserialize)]
struct CMCStatus {
    error_code: u32,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CMCErrorResponse {
    status: CMCStatus,
}

#[derive(Debug, Deserialize, Clone)]
struct CMCToken {
    name: String,
    symbol: String,
    last_updated: DateTime<Utc>,
    quote: CMCTokenQuote,
}

#[derive(Debug, Deserialize, Clone)]
struct CMCTokenQuote {
    #[serde(rename = "USD")]
    usd: Option<CMCTokenQuoteUSD>,
}

#[derive(Debug, Deserialize, Clone)]
struct CMCTokenQuoteUSD {
    price: Option<f64>,
}

impl CMCToken {
    fn into_quote_item(self) -> Result<QuoteItem> {
        let price = self.quote.usd.and_then(|usd| usd.price).ok_or_else(|| {
            Error::UpstreamDecode(format!("{}: missing USD price for {}", SOURCE, self.symbol))
        })?;

        QuoteItem::new(self.symbol, self.name, self.last_updated, BASE_CURRENCY, price)
    }
}

/// Quotes crypto prices in USD from the CoinMarketCap latest-quotes endpoint.
#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl CoinMarketCapClient {
    pub fn new(client: Client, api_key: String) -> Self {
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

    fn quotes_url(&self, targets: &[String]) -> Result<String> {
        build_url(
            &format!("{}/{}", self.base_url, QUOTES_ENDPOINT),
            &[
                Query::new(SYMBOL_QUERY, targets.join(",")),
                Query::new(CONVERT_QUERY, BASE_CURRENCY),
            ],
        )
    }
}

fn flatten_quotes(data: HashMap<String, CMCToken>) -> Result<Vec<QuoteItem>> {
    let mut items = data
        .into_values()
        .map(CMCToken::into_quote_item)
        .collect::<Result<Vec<_>>>()?;
    sort_quote_items(&mut items);
    Ok(items)
}

#[async_trait]
impl Oracle for CoinMarketCapClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_quotes(&self, targets: &[String]) -> Result<Vec<QuoteItem>> {
        validate_targets(targets)?;
        let url = self.quotes_url(targets)?;
        debug!("Requesting {} quotes: {}", SOURCE, url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| request_failed(SOURCE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<CMCErrorResponse>(&body)
                .ok()
                .and_then(|r| r.status.error_message)
                .unwrap_or_default();
            return Err(Error::UpstreamUnavailable(format!(
                "{} request returns statusCode={} {}",
                SOURCE,
                status.as_u16(),
                reason
            )
            .trim_end()
            .to_string()));
        }

        let quotes: CMCResponse = decode_json(response, SOURCE).await?;
        if quotes.status.error_code != 0 {
            return Err(Error::UpstreamUnavailable(format!(
                "{} returns error_code={} {}",
                SOURCE,
                quotes.status.error_code,
                quotes.status.error_message.unwrap_or_default()
            )));
        }
        let data = quotes
            .data
            .ok_or_else(|| Error::UpstreamDecode(format!("{}: response has no data", SOURCE)))?;

        let items = flatten_quotes(data)?;
        info!("Fetched {} quotes from {}", items.len(), SOURCE);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTES_RESPONSE: &str = r#"{
        "status": {"timestamp": "2021-10-31T06:10:00.000Z", "error_code": 0, "error_message": null},
        "data": {
            "ETH": {"id": 1027, "name": "Ethereum", "symbol": "ETH", "slug": "ethereum",
                    "last_updated": "2021-10-31T06:09:02.000Z",
                    "quote": {"USD": {"price": 4300.12, "volume_24h": 1.0, "last_updated": "2021-10-31T06:09:02.000Z"}}},
            "BTC": {"id": 1, "name": "Bitcoin", "symbol": "BTC", "slug": "bitcoin",
                    "last_updated": "2021-10-31T06:08:02.000Z",
                    "quote": {"USD": {"price": 61234.5, "volume_24h": 2.0, "last_updated": "2021-10-31T06:08:02.000Z"}}},
            "ADA": {"id": 2010, "name": "Cardano", "symbol": "ADA", "slug": "cardano",
                    "last_updated": "2021-10-31T06:07:02.000Z",
                    "quote": {"USD": {"price": 1.98}}}
        }
    }"#;

    #[test]
    fn test_flatten_quotes_sorts_by_symbol() {
        let response: CMCResponse = serde_json::from_str(QUOTES_RESPONSE).unwrap();

        let items = flatten_quotes(response.data.unwrap()).unwrap();

        let symbols: Vec<&str> = items.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ADA", "BTC", "ETH"]);
        assert_eq!(items[1].name, "Bitcoin");
        assert_eq!(items[1].price, 61234.5);
        assert_eq!(items[1].base_currency, "USD");
        assert_eq!(items[1].last_updated.to_rfc3339(), "2021-10-31T06:08:02+00:00");
    }

    #[test]
    fn test_token_without_usd_quote_is_decode_error() {
        let raw = r#"{"name": "Bitcoin", "symbol": "BTC", "last_updated": "2021-10-31T06:08:02.000Z",
                      "quote": {"EUR": {"price": 1.0}}}"#;
        let token: CMCToken = serde_json::from_str(raw).unwrap();

        assert!(matches!(token.into_quote_item(), Err(Error::UpstreamDecode(_))));
    }

    #[test]
    fn test_quotes_url() {
        let client = CoinMarketCapClient::new(Client::new(), "key".to_string())
            .with_base_url("http://localhost:1234");

        assert_eq!(
            client.quotes_url(&["BTC".to_string(), "ETH".to_string()]).unwrap(),
            "http://localhost:1234/cryptocurrency/quotes/latest?convert=USD&symbol=BTC%2CETH"
        );
    }
}
