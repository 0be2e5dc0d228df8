use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::clock::Clock;
use crate::config::{Config, OracleKind};
use crate::error::{Error, Result};
use crate::models::QuoteItem;

pub mod coingecko;
pub mod coinmarketcap;
pub mod thaisec;

pub use coingecko::CoinGeckoClient;
pub use coinmarketcap::CoinMarketCapClient;
pub use thaisec::ThaiSecClient;

/// Price oracle for a set of instruments.
///
/// Implementations return one [`QuoteItem`] per requested identifier, sorted by symbol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_quotes(&self, targets: &[String]) -> Result<Vec<QuoteItem>>;
}

/// A single query string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub key: String,
    pub value: String,
}

impl Query {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Appends `queries` to `base_url`, merging with any query already present.
///
/// Parameters are emitted sorted by key so the output does not depend on insertion order.
/// Values of a repeated key keep their relative order.
pub fn build_url(base_url: &str, queries: &[Query]) -> Result<String> {
    let mut url = Url::parse(base_url)?;

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.extend(queries.iter().map(|q| (q.key.clone(), q.value.clone())));
    params.sort_by(|a, b| a.0.cmp(&b.0));

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    Ok(url.to_string())
}

/// Sorts quote items by symbol, ascending.
pub fn sort_quote_items(items: &mut [QuoteItem]) {
    items.sort_by(|a, b| a.symbol.cmp(&b.symbol));
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn request_failed(source: &str, err: reqwest::Error) -> Error {
    Error::UpstreamUnavailable(format!("fail to request {} data: {}", source, err))
}

/// Rejects non-success responses as `UpstreamUnavailable`.
pub(crate) fn check_status(response: Response, source: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::UpstreamUnavailable(format!(
            "{} request returns statusCode={}",
            source,
            status.as_u16()
        )));
    }
    Ok(response)
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response, source: &str) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("fail to read {} response: {}", source, e)))?;
    debug!("{} response body: {}", source, body);
    serde_json::from_str(&body)
        .map_err(|e| Error::UpstreamDecode(format!("fail to decode {} response: {}", source, e)))
}

/// Builds the oracle selected in `config`.
pub fn create_oracle(config: &Config, clock: Arc<dyn Clock>) -> Result<Box<dyn Oracle>> {
    let client = http_client(config.timeout())?;

    let oracle: Box<dyn Oracle> = match config.oracle {
        OracleKind::CoinGecko => {
            let mut oracle = CoinGeckoClient::new(client, config.api.coingecko_api_key.clone());
            if let Some(base_url) = &config.api.coingecko_base_url {
                oracle = oracle.with_base_url(base_url);
            }
            Box::new(oracle)
        }
        OracleKind::CoinMarketCap => {
            let api_key = config
                .api
                .cmc_api_key
                .clone()
                .ok_or_else(|| Error::ConfigError("cmc api key is required".to_string()))?;
            let mut oracle = CoinMarketCapClient::new(client, api_key);
            if let Some(base_url) = &config.api.cmc_base_url {
                oracle = oracle.with_base_url(base_url);
            }
            Box::new(oracle)
        }
        OracleKind::ThaiSec => {
            let fund_fact_key = config.api.sec_fund_fact_api_key.clone().ok_or_else(|| {
                Error::ConfigError("sec fund fact api key is required".to_string())
            })?;
            let daily_info_key = config.api.sec_fund_daily_info_api_key.clone().ok_or_else(|| {
                Error::ConfigError("sec fund daily info api key is required".to_string())
            })?;
            let mut oracle = ThaiSecClient::new(client, fund_fact_key, daily_info_key, clock)
                .with_nav_date_offset(config.nav_date_offset_days);
            if let Some(base_url) = &config.api.sec_fund_fact_base_url {
                oracle = oracle.with_fund_fact_base_url(base_url);
            }
            if let Some(base_url) = &config.api.sec_fund_daily_info_base_url {
                oracle = oracle.with_daily_info_base_url(base_url);
            }
            Box::new(oracle)
        }
    };

    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn quote(symbol: &str, millis: i64) -> QuoteItem {
        QuoteItem::new(
            symbol,
            format!("{} Token", symbol),
            Utc.timestamp_millis_opt(millis).unwrap(),
            "USD",
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_build_url_sorts_params() {
        let queries = vec![Query::new("foo", "spam"), Query::new("bar", "ham")];

        let result = build_url("https://example.com/hello", &queries).unwrap();

        assert_eq!(result, "https://example.com/hello?bar=ham&foo=spam");
    }

    #[test]
    fn test_build_url_is_insertion_order_independent() {
        let a = build_url(
            "https://example.com/x",
            &[Query::new("ids", "bitcoin,ethereum"), Query::new("vs_currency", "usd")],
        )
        .unwrap();
        let b = build_url(
            "https://example.com/x",
            &[Query::new("vs_currency", "usd"), Query::new("ids", "bitcoin,ethereum")],
        )
        .unwrap();

        assert_eq!(a, b);
        assert_eq!(a, "https://example.com/x?ids=bitcoin%2Cethereum&vs_currency=usd");
    }

    #[test]
    fn test_build_url_round_trips_params() {
        let queries = vec![
            Query::new("symbol", "BTC,ETH"),
            Query::new("note", "a b&c=d"),
            Query::new("empty", ""),
            Query::new("thai", "กองทุน"),
        ];

        let result = build_url("https://example.com/v1/quotes", &queries).unwrap();
        let parsed: BTreeSet<(String, String)> = Url::parse(&result)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let expected: BTreeSet<(String, String)> =
            queries.into_iter().map(|q| (q.key, q.value)).collect();

        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_build_url_keeps_existing_query() {
        let result = build_url("https://example.com/path?z=1", &[Query::new("a", "2")]).unwrap();
        assert_eq!(result, "https://example.com/path?a=2&z=1");
    }

    #[test]
    fn test_build_url_without_params() {
        assert_eq!(build_url("https://example.com/path", &[]).unwrap(), "https://example.com/path");
    }

    #[test]
    fn test_build_url_rejects_malformed_base() {
        assert!(matches!(build_url("not a url", &[]), Err(Error::MalformedUrl(_))));
        assert!(matches!(build_url("/hello", &[Query::new("a", "b")]), Err(Error::MalformedUrl(_))));
    }

    #[test]
    fn test_sort_quote_items_alphabetically() {
        let item_a = quote("A", 1);
        let item_b = quote("B", 3);
        let item_c = quote("C", 2);
        let mut items = vec![item_c.clone(), item_a.clone(), item_b.clone()];

        sort_quote_items(&mut items);

        assert_eq!(items, vec![item_a, item_b, item_c]);
    }

    #[test]
    fn test_sort_quote_items_is_idempotent() {
        let mut items = vec![quote("ETH", 1), quote("ADA", 2), quote("BTC", 3), quote("ADA", 4)];
        sort_quote_items(&mut items);
        let once = items.clone();
        sort_quote_items(&mut items);

        assert_eq!(items, once);
        assert!(items.windows(2).all(|w| w[0].symbol <= w[1].symbol));
    }

    #[test]
    fn test_create_oracle_requires_cmc_key() {
        let mut config = crate::config::tests::test_config();
        config.oracle = OracleKind::CoinMarketCap;
        config.api.cmc_api_key = None;

        let result = create_oracle(&config, Arc::new(SystemClock));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_create_oracle_selects_variant() {
        let mut config = crate::config::tests::test_config();

        config.oracle = OracleKind::CoinGecko;
        assert_eq!(create_oracle(&config, Arc::new(SystemClock)).unwrap().name(), "CoinGecko");

        config.oracle = OracleKind::CoinMarketCap;
        assert_eq!(create_oracle(&config, Arc::new(SystemClock)).unwrap().name(), "CoinMarketCap");

        config.oracle = OracleKind::ThaiSec;
        assert_eq!(create_oracle(&config, Arc::new(SystemClock)).unwrap().name(), "Thai SEC");
    }
}
