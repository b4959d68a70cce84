//! Normalized market-data containers
//!
//! Providers return heterogeneous payloads; everything is normalized into
//! the types here before any ratio math runs. Field keys follow the
//! canonical names in [`fields`], and every numeric value is optional so a
//! sparse statement never panics downstream.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical field keys for period records
pub mod fields {
    pub const NET_INCOME: &str = "net_income";
    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const COST_OF_REVENUE: &str = "cost_of_revenue";
    pub const GROSS_PROFIT: &str = "gross_profit";
    pub const TOTAL_ASSETS: &str = "total_assets";
    pub const TOTAL_LIABILITIES: &str = "total_liabilities";
    pub const SHAREHOLDERS_EQUITY: &str = "shareholders_equity";
    pub const OPERATING_CASH_FLOW: &str = "operating_cash_flow";
}

/// The kind of data a fetch call resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    FinancialStatements,
    CompanyInfo,
    PriceHistory,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialStatements => "financial_statements",
            Self::CompanyInfo => "company_info",
            Self::PriceHistory => "price_history",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one provider attempt for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProvenance {
    /// Provider that was attempted
    pub provider: String,
    /// What was being fetched
    pub request: RequestKind,
    /// Whether this attempt produced the payload
    pub succeeded: bool,
    /// When the attempt was made
    pub attempted_at: DateTime<Utc>,
}

impl ProviderProvenance {
    pub fn new(provider: impl Into<String>, request: RequestKind, succeeded: bool) -> Self {
        Self {
            provider: provider.into(),
            request,
            succeeded,
            attempted_at: Utc::now(),
        }
    }
}

/// A successful fetch: the payload plus the full attempt trail
///
/// `attempts` lists every provider invoked in order; failed attempts come
/// first and the provider that answered is last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub payload: T,
    pub attempts: Vec<ProviderProvenance>,
}

/// One reporting period of one financial statement
///
/// Values keyed by the canonical names in [`fields`]; a missing or null
/// field simply has no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    /// Period label, e.g. the fiscal date ending ("2023-12-31")
    pub period: String,
    /// Canonical field key to value
    pub values: BTreeMap<String, f64>,
}

impl PeriodRecord {
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            values: BTreeMap::new(),
        }
    }

    /// Set a field value; None leaves the field absent
    pub fn with(mut self, key: &str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            self.values.insert(key.to_string(), v);
        }
        self
    }

    /// Look up a field value
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// Financial statements for one ticker, most recent period first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialDataBundle {
    pub balance_sheet: Vec<PeriodRecord>,
    pub income_statement: Vec<PeriodRecord>,
    pub cash_flow: Vec<PeriodRecord>,
}

impl FinancialDataBundle {
    /// A bundle with no statements at all counts as an empty payload
    pub fn is_empty(&self) -> bool {
        self.balance_sheet.is_empty() && self.income_statement.is_empty() && self.cash_flow.is_empty()
    }

    /// Most recent balance sheet period, if any
    pub fn latest_balance(&self) -> Option<&PeriodRecord> {
        self.balance_sheet.first()
    }

    /// Most recent income statement period, if any
    pub fn latest_income(&self) -> Option<&PeriodRecord> {
        self.income_statement.first()
    }
}

/// Company profile data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

impl CompanyProfile {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// A profile carrying nothing beyond the echoed symbol is empty
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
            && self.market_cap.is_none()
            && self.shares_outstanding.is_none()
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Payloads the manager can judge for emptiness
///
/// A provider that answers with an empty payload has not answered; the
/// manager moves on to the next provider.
pub trait Payload {
    fn is_empty_payload(&self) -> bool;
}

impl Payload for FinancialDataBundle {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for CompanyProfile {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for Vec<PricePoint> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}
