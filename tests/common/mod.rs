#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use price_updater::models::TradingPair;
use serde_json::{json, Value};
use std::time::Duration;

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn targets(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 10, 31, 0, 0, 0).unwrap()
}

pub fn service_account_json(token_uri: &str) -> String {
    let raw = include_str!("../fixtures/service_account.json");
    let mut key: Value = serde_json::from_str(raw).unwrap();
    key["token_uri"] = json!(token_uri);
    key.to_string()
}

pub fn oauth_credential_json(server_uri: &str) -> String {
    json!({
        "installed": {
            "client_id": "client-123.apps.googleusercontent.com",
            "project_id": "price-updater-test",
            "auth_uri": format!("{}/o/oauth2/auth", server_uri),
            "token_uri": format!("{}/token", server_uri),
            "client_secret": "shh",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob"]
        }
    })
    .to_string()
}

pub fn trading_pair(base: &str, quote: &str, price: f64) -> TradingPair {
    TradingPair {
        base_symbol: base.to_string(),
        quote_symbol: quote.to_string(),
        price,
        updated_time: Utc.with_ymd_and_hms(2021, 10, 31, 6, 4, 7).unwrap(),
    }
}
