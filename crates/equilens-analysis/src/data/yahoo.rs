//! Yahoo Finance data provider

use crate::data::provider::DataSourceProvider;
use crate::data::{CompanyProfile, FinancialDataBundle, PricePoint};
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::config::YAHOO_PROVIDER;

/// Yahoo Finance provider
///
/// Covers price history well and company profiles partially (name and
/// exchange via ticker search). The Rust client exposes no financial
/// statement endpoint, so statements come back as an empty bundle and the
/// manager falls through to the next provider for that request.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new().map_err(|e| AnalysisError::ProviderApi {
            provider: YAHOO_PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { connector })
    }

    fn api_err(&self, e: impl ToString) -> AnalysisError {
        AnalysisError::ProviderApi {
            provider: YAHOO_PROVIDER.to_string(),
            message: e.to_string(),
        }
    }

    /// Map six-digit China A-share codes onto Yahoo's exchange suffixes
    ///
    /// 6xxxxx trades in Shanghai (.SS), 0xxxxx and 3xxxxx in Shenzhen
    /// (.SZ). Anything else passes through unchanged.
    pub fn normalize_symbol(symbol: &str) -> String {
        let trimmed = symbol.trim();
        if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            match trimmed.as_bytes()[0] {
                b'6' => return format!("{trimmed}.SS"),
                b'0' | b'3' => return format!("{trimmed}.SZ"),
                _ => {}
            }
        }
        trimmed.to_string()
    }
}

#[async_trait]
impl DataSourceProvider for YahooProvider {
    fn name(&self) -> &str {
        YAHOO_PROVIDER
    }

    async fn health_check(&self) -> bool {
        // No credentials to verify; the HTTP client was already built in
        // the constructor
        true
    }

    async fn financial_statements(&self, _symbol: &str) -> Result<FinancialDataBundle> {
        // Yahoo Finance's Rust client has no statements endpoint; an
        // empty bundle tells the manager to try the next provider
        Ok(FinancialDataBundle::default())
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyProfile> {
        let normalized = Self::normalize_symbol(symbol);
        let search = self
            .connector
            .search_ticker(&normalized)
            .await
            .map_err(|e| self.api_err(e))?;

        let mut profile = CompanyProfile::new(&normalized);
        if let Some(hit) = search
            .quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(&normalized))
        {
            profile.name = non_empty(&hit.long_name).or_else(|| non_empty(&hit.short_name));
            profile.exchange = non_empty(&hit.exchange);
        }
        Ok(profile)
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let normalized = Self::normalize_symbol(symbol);

        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .ok_or_else(|| self.api_err(format!("invalid start date: {start}")))?;
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc().timestamp())
            .ok_or_else(|| self.api_err(format!("invalid end date: {end}")))?;

        let start_odt = OffsetDateTime::from_unix_timestamp(start_ts)
            .map_err(|e| self.api_err(format!("invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end_ts)
            .map_err(|e| self.api_err(format!("invalid end timestamp: {e}")))?;

        let response = self
            .connector
            .get_quote_history(&normalized, start_odt, end_odt)
            .await
            .map_err(|e| self.api_err(e))?;

        let quotes = response.quotes().map_err(|e| self.api_err(e))?;

        let mut bars: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(PricePoint {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Payload;

    #[test]
    fn test_normalize_shanghai_symbol() {
        assert_eq!(YahooProvider::normalize_symbol("600519"), "600519.SS");
    }

    #[test]
    fn test_normalize_shenzhen_symbols() {
        assert_eq!(YahooProvider::normalize_symbol("000001"), "000001.SZ");
        assert_eq!(YahooProvider::normalize_symbol("300750"), "300750.SZ");
    }

    #[test]
    fn test_normalize_passes_other_symbols_through() {
        assert_eq!(YahooProvider::normalize_symbol("AAPL"), "AAPL");
        assert_eq!(YahooProvider::normalize_symbol(" MSFT "), "MSFT");
        // Already suffixed or non-equity codes are left alone
        assert_eq!(YahooProvider::normalize_symbol("600519.SS"), "600519.SS");
    }

    #[tokio::test]
    async fn test_statements_are_always_empty() {
        let provider = YahooProvider::new().unwrap();
        let bundle = provider.financial_statements("AAPL").await.unwrap();
        assert!(bundle.is_empty_payload());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_price_history() {
        let provider = YahooProvider::new().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let bars = provider.price_history("AAPL", start, end).await.unwrap();
        assert!(!bars.is_empty());
        assert!(bars.windows(2).all(|w| w[0].date <= w[1].date));
        assert!(bars[0].close > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_company_info() {
        let provider = YahooProvider::new().unwrap();
        let profile = provider.company_info("AAPL").await.unwrap();
        assert_eq!(profile.symbol, "AAPL");
        assert!(profile.name.is_some());
    }
}
