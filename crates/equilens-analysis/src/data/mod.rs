//! Data acquisition layer
//!
//! Providers fetch raw payloads from external market-data services, the
//! manager arbitrates between them by priority, and the cache sits in
//! front of the manager as an optional lookaside.

pub mod alpha_vantage;
pub mod bundle;
pub mod cache;
pub mod manager;
pub mod provider;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageProvider;
pub use bundle::{
    fields, CompanyProfile, Fetched, FinancialDataBundle, Payload, PeriodRecord, PricePoint,
    ProviderProvenance, RequestKind,
};
pub use cache::{CacheKey, CacheManager, DataCache};
pub use manager::DataSourceManager;
pub use provider::DataSourceProvider;
pub use yahoo::YahooProvider;
