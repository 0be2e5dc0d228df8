use clap::Parser;
use std::path::PathBuf;

use crate::config::{OracleKind, UpdaterKind};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file; replaces the flags below when given
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Price oracle to fetch quotes from
    #[arg(short, long, env = "ORACLE", value_enum, default_value_t = OracleKind::CoinGecko)]
    pub oracle: OracleKind,

    /// List of target symbols (coin ids for CoinGecko, fund names for Thai SEC)
    #[arg(short, long = "target-symbols", env = "TARGET_SYMBOLS", value_delimiter = ',')]
    pub target_symbols: Vec<String>,

    /// CoinGecko Pro API key
    #[arg(long = "coingecko-apikey", env = "COINGECKO_API_KEY")]
    pub coingecko_api_key: Option<String>,

    /// CoinMarketCap API key
    #[arg(short = 'k', long = "cmc-apikey", env = "CMC_API_KEY")]
    pub cmc_api_key: Option<String>,

    /// Thai SEC fund factsheet API key
    #[arg(long = "sec-fund-fact-apikey", env = "SEC_FUND_FACT_API_KEY")]
    pub sec_fund_fact_api_key: Option<String>,

    /// Thai SEC fund daily info API key
    #[arg(long = "sec-fund-daily-info-apikey", env = "SEC_FUND_DAILY_INFO_API_KEY")]
    pub sec_fund_daily_info_api_key: Option<String>,

    /// Days to look back when querying fund NAV
    #[arg(long = "nav-date-offset", env = "NAV_DATE_OFFSET", default_value_t = crate::api::thaisec::DEFAULT_NAV_DATE_OFFSET_DAYS)]
    pub nav_date_offset: u32,

    /// How to authenticate against Google Sheets
    #[arg(long = "gsheet-updater", env = "GSHEET_UPDATER", value_enum, default_value_t = UpdaterKind::ServiceAccount)]
    pub gsheet_updater: UpdaterKind,

    /// Path to Google service account key file
    #[arg(short = 's', long = "gsheet-sa-path", env = "GSHEET_SA_PATH")]
    pub gsheet_sa_path: Option<PathBuf>,

    /// Path to Google OAuth client credential file
    #[arg(long = "gsheet-oauth-credential-path", env = "GSHEET_OAUTH_CREDENTIAL_PATH")]
    pub gsheet_oauth_credential_path: Option<PathBuf>,

    /// Path where the Google OAuth token is cached
    #[arg(long = "gsheet-oauth-token-path", env = "GSHEET_OAUTH_TOKEN_PATH")]
    pub gsheet_oauth_token_path: Option<PathBuf>,

    /// Google Sheet ID
    #[arg(short = 'i', long = "gsheet-id", env = "GSHEET_ID")]
    pub gsheet_id: Option<String>,

    /// Google Sheet range to work on
    #[arg(short = 'r', long = "gsheet-range", env = "GSHEET_RANGE", default_value = crate::config::DEFAULT_WRITE_RANGE)]
    pub gsheet_range: String,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout-secs", env = "HTTP_TIMEOUT_SECS", default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Append logs to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "price-updater",
            "--oracle",
            "thaisec",
            "-t",
            "K-INDIA,SCBSET",
            "--sec-fund-fact-apikey",
            "fact",
            "--sec-fund-daily-info-apikey",
            "daily",
            "--gsheet-updater",
            "oauth",
            "-i",
            "sheet",
        ])
        .unwrap();

        assert_eq!(cli.oracle, OracleKind::ThaiSec);
        assert_eq!(cli.target_symbols, vec!["K-INDIA", "SCBSET"]);
        assert_eq!(cli.gsheet_updater, UpdaterKind::OAuth);
        assert_eq!(cli.gsheet_range, "Sheet1!A1:C");
        assert_eq!(cli.nav_date_offset, 5);
        assert_eq!(cli.gsheet_id.as_deref(), Some("sheet"));
    }
}
