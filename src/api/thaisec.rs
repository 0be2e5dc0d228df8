use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;

use crate::api::{check_status, decode_json, request_failed, sort_quote_items, Oracle};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::QuoteItem;
use crate::validation::validate_targets;

const FUND_FACT_BASE_URL: &str = "https://api.sec.or.th/FundFactsheet";
const DAILY_INFO_BASE_URL: &str = "https://api.sec.or.th/FundDailyInfo";
const FUND_INFO_ENDPOINT: [&str; 2] = ["fund", "class_fund"];
const DAILY_NAV_SEGMENT: &str = "dailynav";
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const NAV_DATE_FORMAT: &str = "%Y-%m-%d";
const BASE_CURRENCY: &str = "THB";
const SOURCE: &str = "Thai SEC";

/// Asia/Bangkok has no daylight saving time.
const BANGKOK_UTC_OFFSET_HOURS: i64 = 7;

pub const DEFAULT_NAV_DATE_OFFSET_DAYS: u32 = 5;

#[derive(Debug, Deserialize, Clone)]
struct FundInfo {
    proj_id: String,
    proj_abbr_name: String,
}

#[derive(Debug, Deserialize, Clone)]
struct FundPriceInfo {
    nav_date: String,
    last_val: f64,
}

/// Date of the NAV to query: `offset_days` before today in Bangkok, formatted `YYYY-MM-DD`.
pub fn nav_query_date(now: DateTime<Utc>, offset_days: u32) -> Result<String> {
    let today = (now + Duration::hours(BANGKOK_UTC_OFFSET_HOURS)).date_naive();
    let date = today
        .checked_sub_days(Days::new(u64::from(offset_days)))
        .ok_or_else(|| Error::ConfigError(format!("nav date offset {} is out of range", offset_days)))?;
    Ok(date.format(NAV_DATE_FORMAT).to_string())
}

/// Appends `segments` to `base_url`, percent-encoding each one.
fn join_url(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| Error::MalformedUrl(format!("{} cannot be a base URL", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Midnight of `nav_date` in Bangkok.
fn parse_nav_date(nav_date: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(nav_date, NAV_DATE_FORMAT)
        .map_err(|e| Error::UpstreamDecode(format!("invalid nav_date {:?}: {}", nav_date, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::UpstreamDecode(format!("invalid nav_date {:?}", nav_date)))?;
    Ok((midnight - Duration::hours(BANGKOK_UTC_OFFSET_HOURS)).and_utc())
}

/// Quotes Thai mutual fund NAVs (in THB) from the Thai SEC open data APIs.
///
/// Each fund costs two sequential requests: a fund-fact lookup by name to find the
/// project id, then the daily NAV for that project. The first failing fund aborts the
/// whole batch.
#[derive(Clone)]
pub struct ThaiSecClient {
    client: Client,
    fund_fact_api_key: String,
    daily_info_api_key: String,
    fund_fact_base_url: String,
    daily_info_base_url: String,
    nav_date_offset_days: u32,
    clock: Arc<dyn Clock>,
}

impl ThaiSecClient {
    pub fn new(
        client: Client,
        fund_fact_api_key: String,
        daily_info_api_key: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            fund_fact_api_key,
            daily_info_api_key,
            fund_fact_base_url: FUND_FACT_BASE_URL.to_string(),
            daily_info_base_url: DAILY_INFO_BASE_URL.to_string(),
            nav_date_offset_days: DEFAULT_NAV_DATE_OFFSET_DAYS,
            clock,
        }
    }

    pub fn with_fund_fact_base_url(mut self, base_url: &str) -> Self {
        self.fund_fact_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_daily_info_base_url(mut self, base_url: &str) -> Self {
        self.daily_info_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_nav_date_offset(mut self, offset_days: u32) -> Self {
        self.nav_date_offset_days = offset_days;
        self
    }

    async fn get_fund_info(&self, fund_name: &str) -> Result<FundInfo> {
        let url = join_url(&self.fund_fact_base_url, &FUND_INFO_ENDPOINT)?;
        debug!("Requesting {} fund info: {}", SOURCE, url);

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.fund_fact_api_key)
            .json(&json!({ "name": fund_name }))
            .send()
            .await
            .map_err(|e| request_failed(SOURCE, e))?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(Error::FundNotFound("no fund matches the name".to_string()));
        }
        let response = check_status(response, SOURCE)?;
        let funds: Vec<FundInfo> = decode_json(response, SOURCE).await?;

        funds
            .into_iter()
            .next()
            .ok_or_else(|| Error::FundNotFound("no fund matches the name".to_string()))
    }

    async fn get_fund_price(&self, fund_id: &str, query_nav_date: &str) -> Result<FundPriceInfo> {
        let url = join_url(
            &self.daily_info_base_url,
            &[fund_id, DAILY_NAV_SEGMENT, query_nav_date],
        )?;
        debug!("Requesting {} fund price: {}", SOURCE, url);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.daily_info_api_key)
            .send()
            .await
            .map_err(|e| request_failed(SOURCE, e))?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(Error::UpstreamUnavailable(format!(
                "fundID={} queryNavDate={} no NAV reported",
                fund_id, query_nav_date
            )));
        }
        let response = check_status(response, SOURCE)?;
        decode_json(response, SOURCE).await
    }

    async fn get_quote_item(&self, fund_name: &str, query_nav_date: &str) -> Result<QuoteItem> {
        let fund_info = self.get_fund_info(fund_name).await?;
        let fund_price = self.get_fund_price(&fund_info.proj_id, query_nav_date).await?;
        let last_updated = parse_nav_date(&fund_price.nav_date)?;

        QuoteItem::new(
            fund_name,
            fund_info.proj_abbr_name,
            last_updated,
            BASE_CURRENCY,
            fund_price.last_val,
        )
    }
}

#[async_trait]
impl Oracle for ThaiSecClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_quotes(&self, targets: &[String]) -> Result<Vec<QuoteItem>> {
        validate_targets(targets)?;
        let query_nav_date = nav_query_date(self.clock.now(), self.nav_date_offset_days)?;
        info!(
            "Fetching {} funds from {} with queryNavDate={}",
            targets.len(),
            SOURCE,
            query_nav_date
        );

        let mut items = Vec::with_capacity(targets.len());
        for fund_name in targets {
            let item = self
                .get_quote_item(fund_name, &query_nav_date)
                .await
                .map_err(|e| e.for_fund(fund_name))?;
            items.push(item);
        }
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
    fn test_nav_query_date() {
        let now = Utc.with_ymd_and_hms(2021, 10, 31, 0, 0, 0).unwrap();

        assert_eq!(nav_query_date(now, 0).unwrap(), "2021-10-31");
        assert_eq!(nav_query_date(now, 1).unwrap(), "2021-10-30");
        assert_eq!(nav_query_date(now, 5).unwrap(), "2021-10-26");
        assert_eq!(nav_query_date(now, 31).unwrap(), "2021-09-30");
    }

    #[test]
    fn test_nav_query_date_uses_bangkok_day() {
        // 18:00 UTC is already the next day in Bangkok.
        let now = Utc.with_ymd_and_hms(2021, 10, 30, 18, 0, 0).unwrap();
        assert_eq!(nav_query_date(now, 0).unwrap(), "2021-10-31");
    }

    #[test]
    fn test_parse_nav_date_in_bangkok() {
        let parsed = parse_nav_date("2021-10-22").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 10, 21, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_join_url_encodes_segments() {
        let url = join_url(
            "https://api.sec.or.th/FundDailyInfo/",
            &["M0001/2554?x", DAILY_NAV_SEGMENT, "2021-10-26"],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.sec.or.th/FundDailyInfo/M0001%2F2554%3Fx/dailynav/2021-10-26"
        );
        assert_eq!(
            join_url(FUND_FACT_BASE_URL, &FUND_INFO_ENDPOINT).unwrap().as_str(),
            "https://api.sec.or.th/FundFactsheet/fund/class_fund"
        );
    }

    #[test]
    fn test_parse_nav_date_rejects_garbage() {
        assert!(matches!(parse_nav_date("22/10/2021"), Err(Error::UpstreamDecode(_))));
    }
}
