use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::thaisec::DEFAULT_NAV_DATE_OFFSET_DAYS;
use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::validation::{validate_api_key, validate_targets};

pub const DEFAULT_WRITE_RANGE: &str = "Sheet1!A1:C";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OracleKind {
    #[serde(rename = "coingecko")]
    #[value(name = "coingecko")]
    CoinGecko,
    #[serde(rename = "coinmarketcap", alias = "cmc")]
    #[value(name = "coinmarketcap", alias = "cmc")]
    CoinMarketCap,
    #[serde(rename = "thaisec")]
    #[value(name = "thaisec")]
    ThaiSec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum UpdaterKind {
    #[serde(rename = "service-account")]
    #[value(name = "service-account")]
    ServiceAccount,
    #[serde(rename = "oauth")]
    #[value(name = "oauth")]
    OAuth,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub oracle: OracleKind,
    pub targets: Vec<String>,
    #[serde(default = "default_nav_date_offset")]
    pub nav_date_offset_days: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api: ApiConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApiConfig {
    pub coingecko_api_key: Option<String>,
    pub cmc_api_key: Option<String>,
    pub sec_fund_fact_api_key: Option<String>,
    pub sec_fund_daily_info_api_key: Option<String>,
    pub coingecko_base_url: Option<String>,
    pub cmc_base_url: Option<String>,
    pub sec_fund_fact_base_url: Option<String>,
    pub sec_fund_daily_info_base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SheetConfig {
    pub id: String,
    #[serde(default = "default_write_range")]
    pub range: String,
    pub updater: UpdaterKind,
    pub service_account_path: Option<PathBuf>,
    pub oauth_credential_path: Option<PathBuf>,
    pub oauth_token_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

fn default_nav_date_offset() -> u32 {
    DEFAULT_NAV_DATE_OFFSET_DAYS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_write_range() -> String {
    DEFAULT_WRITE_RANGE.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if let Some(path) = &cli.config {
            return Self::load(path);
        }

        Ok(Config {
            oracle: cli.oracle,
            targets: cli
                .target_symbols
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            nav_date_offset_days: cli.nav_date_offset,
            timeout_secs: cli.timeout_secs,
            api: ApiConfig {
                coingecko_api_key: cli.coingecko_api_key.clone(),
                cmc_api_key: cli.cmc_api_key.clone(),
                sec_fund_fact_api_key: cli.sec_fund_fact_api_key.clone(),
                sec_fund_daily_info_api_key: cli.sec_fund_daily_info_api_key.clone(),
                ..ApiConfig::default()
            },
            sheet: SheetConfig {
                id: cli.gsheet_id.clone().unwrap_or_default(),
                range: cli.gsheet_range.clone(),
                updater: cli.gsheet_updater,
                service_account_path: cli.gsheet_sa_path.clone(),
                oauth_credential_path: cli.gsheet_oauth_credential_path.clone(),
                oauth_token_path: cli.gsheet_oauth_token_path.clone(),
                base_url: None,
            },
        })
    }

    /// Checks that every setting the selected oracle and updater need is present.
    pub fn validate(&self) -> Result<()> {
        validate_targets(&self.targets)?;

        match self.oracle {
            OracleKind::CoinGecko => {}
            OracleKind::CoinMarketCap => {
                validate_api_key("cmc api key", self.api.cmc_api_key.as_deref())?;
            }
            OracleKind::ThaiSec => {
                validate_api_key("sec fund fact api key", self.api.sec_fund_fact_api_key.as_deref())?;
                validate_api_key(
                    "sec fund daily info api key",
                    self.api.sec_fund_daily_info_api_key.as_deref(),
                )?;
            }
        }

        if self.sheet.id.trim().is_empty() {
            return Err(Error::ConfigError("gsheet id is required".to_string()));
        }
        if self.sheet.range.trim().is_empty() {
            return Err(Error::ConfigError("gsheet range is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::ConfigError("timeout must be at least one second".to_string()));
        }

        match self.sheet.updater {
            UpdaterKind::ServiceAccount => {
                if self.sheet.service_account_path.is_none() {
                    return Err(Error::ConfigError("gsheet service account path is required".to_string()));
                }
            }
            UpdaterKind::OAuth => {
                if self.sheet.oauth_credential_path.is_none() {
                    return Err(Error::ConfigError("gsheet oauth credential path is required".to_string()));
                }
                if self.sheet.oauth_token_path.is_none() {
                    return Err(Error::ConfigError("gsheet oauth token path is required".to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
