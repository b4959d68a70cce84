//! Alpha Vantage data provider

use crate::config::ALPHA_VANTAGE_PROVIDER;
use crate::data::provider::DataSourceProvider;
use crate::data::{fields, CompanyProfile, FinancialDataBundle, PeriodRecord, PricePoint};
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Free tier allowance
const DEFAULT_RATE_LIMIT: NonZeroU32 = NonZeroU32::new(5).unwrap();

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Statement field mappings from Alpha Vantage report keys to canonical
/// field names
const BALANCE_FIELDS: &[(&str, &str)] = &[
    ("totalAssets", fields::TOTAL_ASSETS),
    ("totalLiabilities", fields::TOTAL_LIABILITIES),
    ("totalShareholderEquity", fields::SHAREHOLDERS_EQUITY),
];

const INCOME_FIELDS: &[(&str, &str)] = &[
    ("totalRevenue", fields::TOTAL_REVENUE),
    ("costOfRevenue", fields::COST_OF_REVENUE),
    ("grossProfit", fields::GROSS_PROFIT),
    ("netIncome", fields::NET_INCOME),
];

const CASH_FLOW_FIELDS: &[(&str, &str)] = &[("operatingCashflow", fields::OPERATING_CASH_FLOW)];

/// Alpha Vantage provider
///
/// Covers all three request kinds through the REST API. Calls are paced
/// by a client-side rate limiter sized for the configured request budget.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider
    ///
    /// `rate_limit` is the maximum requests per minute; `None` uses the
    /// free tier allowance of 5.
    pub fn new(api_key: impl Into<String>, rate_limit: Option<u32>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(AnalysisError::Network)?;

        let per_minute = rate_limit.and_then(NonZeroU32::new).unwrap_or(DEFAULT_RATE_LIMIT);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter,
        })
    }

    /// Create from the ALPHA_VANTAGE_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ALPHA_VANTAGE_API_KEY").map_err(|_| {
            AnalysisError::ConfigInvalid(
                "ALPHA_VANTAGE_API_KEY environment variable not set".to_string(),
            )
        })?;
        Self::new(api_key, None)
    }

    fn api_err(message: impl Into<String>) -> AnalysisError {
        AnalysisError::ProviderApi {
            provider: ALPHA_VANTAGE_PROVIDER.to_string(),
            message: message.into(),
        }
    }

    /// Issue one API call and surface the service's in-band errors
    async fn query(&self, function: &str, symbol: &str, extra: &[(&str, &str)]) -> Result<serde_json::Value> {
        self.rate_limiter.until_ready().await;

        let mut params = HashMap::new();
        params.insert("function", function);
        params.insert("symbol", symbol);
        params.insert("apikey", self.api_key.as_str());
        for (key, value) in extra {
            params.insert(key, value);
        }

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(Self::api_err(format!("HTTP error: {}", response.status())));
        }

        let data: serde_json::Value = response.json().await?;

        if let Some(error) = data.get("Error Message") {
            return Err(Self::api_err(error.to_string()));
        }

        // The service reports throttling in-band as Note or Information
        if data.get("Note").is_some() || data.get("Information").is_some() {
            return Err(AnalysisError::RateLimited {
                provider: ALPHA_VANTAGE_PROVIDER.to_string(),
            });
        }

        Ok(data)
    }
}

#[async_trait]
impl DataSourceProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        ALPHA_VANTAGE_PROVIDER
    }

    async fn health_check(&self) -> bool {
        // Key presence is checked offline; a live probe would burn one of
        // the five free-tier requests per minute
        !self.api_key.trim().is_empty()
    }

    async fn financial_statements(&self, symbol: &str) -> Result<FinancialDataBundle> {
        let balance = self.query("BALANCE_SHEET", symbol, &[]).await?;
        let income = self.query("INCOME_STATEMENT", symbol, &[]).await?;
        let cash = self.query("CASH_FLOW", symbol, &[]).await?;

        Ok(FinancialDataBundle {
            balance_sheet: parse_reports(&balance, BALANCE_FIELDS),
            income_statement: parse_reports(&income, INCOME_FIELDS),
            cash_flow: parse_reports(&cash, CASH_FLOW_FIELDS),
        })
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyProfile> {
        let data = self.query("OVERVIEW", symbol, &[]).await?;
        Ok(profile_from_overview(symbol, &data))
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        // Compact output covers roughly the last 100 trading days
        let outputsize = if (end - start).num_days() > 100 {
            "full"
        } else {
            "compact"
        };
        let data = self
            .query("TIME_SERIES_DAILY", symbol, &[("outputsize", outputsize)])
            .await?;

        let series = data
            .get("Time Series (Daily)")
            .ok_or_else(|| Self::api_err("no daily series in response"))?;

        Ok(bars_from_series(series, start, end))
    }
}

/// Parse one statement's annualReports array into period records
///
/// Alpha Vantage emits every number as a string and uses the literal
/// "None" for missing values; both cases leave the field absent rather
/// than zero.
fn parse_reports(data: &serde_json::Value, mappings: &[(&str, &str)]) -> Vec<PeriodRecord> {
    let Some(reports) = data.get("annualReports").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    reports
        .iter()
        .filter_map(|report| {
            let period = report.get("fiscalDateEnding")?.as_str()?;
            let mut record = PeriodRecord::new(period);
            for (wire, canonical) in mappings {
                if let Some(value) = parse_number(report.get(*wire)) {
                    record.values.insert((*canonical).to_string(), value);
                }
            }
            Some(record)
        })
        .collect()
}

/// Build a company profile from an OVERVIEW response
///
/// An empty object (unknown symbol) yields an empty profile, which the
/// manager counts as a failed attempt.
fn profile_from_overview(symbol: &str, data: &serde_json::Value) -> CompanyProfile {
    let text = |key: &str| {
        data.get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
            .map(String::from)
    };

    CompanyProfile {
        symbol: symbol.to_string(),
        name: text("Name"),
        exchange: text("Exchange"),
        sector: text("Sector"),
        industry: text("Industry"),
        market_cap: parse_number(data.get("MarketCapitalization")),
        shares_outstanding: parse_number(data.get("SharesOutstanding")),
    }
}

/// Extract bars inside the inclusive window, oldest first
fn bars_from_series(series: &serde_json::Value, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    let Some(entries) = series.as_object() else {
        return Vec::new();
    };

    let mut bars: Vec<PricePoint> = entries
        .iter()
        .filter_map(|(date_str, values)| {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
            if date < start || date > end {
                return None;
            }
            Some(PricePoint {
                date,
                open: parse_number(values.get("1. open"))?,
                high: parse_number(values.get("2. high"))?,
                low: parse_number(values.get("3. low"))?,
                close: parse_number(values.get("4. close"))?,
                volume: values
                    .get("5. volume")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars
}

/// Parse a stringly-typed numeric field; "None", "-" and blanks are
/// treated as absent
fn parse_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let raw = value?.as_str()?.trim();
    if raw.is_empty() || raw == "None" || raw == "-" {
        return None;
    }
    raw.parse().ok()
}
