//! Data source provider abstraction

use crate::data::{CompanyProfile, FinancialDataBundle, PricePoint};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// One external market-data source
///
/// Implementations return whatever the upstream has: an `Ok` carrying an
/// empty payload is valid and means "nothing for this symbol here". The
/// manager treats empty payloads as fetch failures for fallback purposes,
/// so providers never need to second-guess that policy themselves.
#[async_trait]
pub trait DataSourceProvider: Send + Sync {
    /// Stable provider name, matched against configuration
    fn name(&self) -> &str;

    /// Probe whether the provider is usable at all
    ///
    /// Called once when the manager is built. A provider that reports
    /// unhealthy here is treated as always-failing without being invoked.
    async fn health_check(&self) -> bool;

    /// Whether the provider tolerates concurrent calls
    ///
    /// Providers backed by clients that are not safe to invoke
    /// concurrently return false and the manager serializes calls to that
    /// provider only.
    fn reentrant(&self) -> bool {
        true
    }

    /// Fetch financial statements, most recent period first
    async fn financial_statements(&self, symbol: &str) -> Result<FinancialDataBundle>;

    /// Fetch the company profile
    async fn company_info(&self, symbol: &str) -> Result<CompanyProfile>;

    /// Fetch daily OHLCV bars for the inclusive date window, in
    /// chronological order (oldest first)
    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;
}
