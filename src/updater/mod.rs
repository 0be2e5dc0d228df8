use async_trait::async_trait;

use crate::api::http_client;
use crate::config::{Config, UpdaterKind};
use crate::error::{Error, Result};
use crate::models::TradingPair;

pub mod auth;
pub mod gsheet;

pub use gsheet::GoogleSheet;

/// Destination the fetched prices are written to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Updater: Send + Sync {
    /// Replaces the previously written prices with `pairs`.
    async fn update_prices(&self, pairs: &[TradingPair]) -> Result<()>;
}

/// Builds the Google Sheet updater in the configured auth mode.
///
/// In OAuth mode without a cached token this blocks on stdin for the authorization code.
pub async fn create_updater(config: &Config) -> Result<Box<dyn Updater>> {
    let client = http_client(config.timeout())?;
    let sheet = &config.sheet;

    let updater = match sheet.updater {
        UpdaterKind::ServiceAccount => {
            let path = sheet.service_account_path.as_deref().ok_or_else(|| {
                Error::ConfigError("gsheet service account path is required".to_string())
            })?;
            GoogleSheet::with_service_account(client, path, sheet.id.clone(), sheet.range.clone())?
        }
        UpdaterKind::OAuth => {
            let credential_path = sheet.oauth_credential_path.as_deref().ok_or_else(|| {
                Error::ConfigError("gsheet oauth credential path is required".to_string())
            })?;
            let token_path = sheet.oauth_token_path.clone().ok_or_else(|| {
                Error::ConfigError("gsheet oauth token path is required".to_string())
            })?;
            GoogleSheet::with_oauth(
                client,
                credential_path,
                token_path,
                sheet.id.clone(),
                sheet.range.clone(),
                std::io::stdin().lock(),
            )
            .await?
        }
    };

    let updater = match &sheet.base_url {
        Some(base_url) => updater.with_base_url(base_url),
        None => updater,
    };

    Ok(Box::new(updater))
}
