use async_trait::async_trait;
use chrono::{Local, TimeZone};
use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Error, Result};
use crate::models::TradingPair;
use crate::updater::auth::{ClientSecret, InstalledFlow, ServiceAccount, TokenProvider};
use crate::updater::Updater;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";
const HEADER_ROW: [&str; 3] = ["Pair", "Price", "Updated Time"];
/// RFC 1123 style, e.g. `Sun, 31 Oct 2021 13:04:07 +07:00`.
const UPDATED_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

/// Header row followed by one `[pair, price, updated time]` row per pair.
pub fn build_rows<Tz>(pairs: &[TradingPair], tz: &Tz) -> Vec<Vec<Value>>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut rows = Vec::with_capacity(pairs.len() + 1);
    rows.push(HEADER_ROW.iter().map(|h| json!(h)).collect());

    for pair in pairs {
        rows.push(vec![
            json!(pair.label()),
            json!(pair.price),
            json!(pair
                .updated_time
                .with_timezone(tz)
                .format(UPDATED_TIME_FORMAT)
                .to_string()),
        ]);
    }

    rows
}

/// Maps a Sheets API response onto the sink error kinds.
async fn check_sheet_response(response: Response, action: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    let reason = serde_json::from_str::<GoogleErrorResponse>(&body)
        .map(|r| r.error.message)
        .unwrap_or(body);
    let message = format!("unable to {}: statusCode={} {}", action, status.as_u16(), reason);

    if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        Err(Error::SinkUnavailable(message))
    } else {
        Err(Error::SinkWriteRejected(message))
    }
}

/// Writes trading pairs into a range of a Google Sheet, replacing what was there.
pub struct GoogleSheet {
    client: Client,
    sheet_id: String,
    write_range: String,
    base_url: String,
    auth: Box<dyn TokenProvider>,
}

impl GoogleSheet {
    pub fn new(client: Client, sheet_id: String, write_range: String, auth: Box<dyn TokenProvider>) -> Self {
        Self {
            client,
            sheet_id,
            write_range,
            base_url: SHEETS_BASE_URL.to_string(),
            auth,
        }
    }

    /// Authenticates with a service account key file.
    pub fn with_service_account(
        client: Client,
        service_account_path: &Path,
        sheet_id: String,
        write_range: String,
    ) -> Result<Self> {
        let auth = ServiceAccount::from_file(client.clone(), service_account_path)?;
        info!("Using service account {}", auth.client_email());
        Ok(Self::new(client, sheet_id, write_range, Box::new(auth)))
    }

    /// Authenticates as a user through the OAuth consent flow, caching the token at
    /// `token_path`. The authorization code, when needed, is read from `input`.
    pub async fn with_oauth<R: BufRead>(
        client: Client,
        credential_path: &Path,
        token_path: PathBuf,
        sheet_id: String,
        write_range: String,
        input: R,
    ) -> Result<Self> {
        let secret = ClientSecret::from_file(credential_path)?;
        let auth = InstalledFlow::new(client.clone(), secret, token_path, input).await?;
        Ok(Self::new(client, sheet_id, write_range, Box::new(auth)))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::MalformedUrl(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.sheet_id)
            .push("values")
            .push(&format!("{}{}", self.write_range, suffix));
        Ok(url)
    }

    async fn clear_range(&self, access_token: &str) -> Result<()> {
        let url = self.values_url(":clear")?;
        debug!("Clearing sheet range: {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| Error::SinkUnavailable(format!("unable to clear sheet range: {}", e)))?;

        check_sheet_response(response, "clear sheet range").await
    }

    async fn write_values(&self, access_token: &str, rows: Vec<Vec<Value>>) -> Result<()> {
        let mut url = self.values_url("")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        debug!("Writing {} rows to sheet: {}", rows.len(), url);

        let response = self
            .client
            .put(url)
            .bearer_auth(access_token)
            .json(&json!({
                "range": self.write_range,
                "majorDimension": "ROWS",
                "values": rows,
            }))
            .send()
            .await
            .map_err(|e| Error::SinkUnavailable(format!("unable to write data to sheet: {}", e)))?;

        check_sheet_response(response, "write data to sheet").await
    }
}

#[async_trait]
impl Updater for GoogleSheet {
    async fn update_prices(&self, pairs: &[TradingPair]) -> Result<()> {
        let access_token = self.auth.access_token().await?;

        self.clear_range(&access_token).await?;
        self.write_values(&access_token, build_rows(pairs, &Local)).await?;

        info!(
            "Wrote {} pairs to sheet {} range {}",
            pairs.len(),
            self.sheet_id,
            self.write_range
        );
        Ok(())
    }
}
