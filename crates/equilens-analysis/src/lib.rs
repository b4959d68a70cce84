//! Single-ticker equity analysis pipeline
//!
//! This crate analyzes one stock at a time by combining market data with
//! generated narrative. It includes:
//!
//! - Data sourcing with priority fallback across providers (Yahoo Finance,
//!   Alpha Vantage) and full provenance of every attempt
//! - Financial ratio derivation (profitability, solvency, growth,
//!   valuation) that omits ratios rather than fabricating zeros
//! - Three concurrent analysis stages producing narrative sections
//! - A report integration stage that merges the sections and extracts a
//!   recommendation, target price range and confidence score
//! - An accumulating run record distinguishing full success, degraded
//!   runs and failures
//!
//! # Architecture
//!
//! [`AnalysisPipeline`] schedules `FinancialMetrics`, `IndustryComparison`
//! and `ValuationAnalysis` as concurrent tasks against a shared
//! [`DataSourceManager`](data::DataSourceManager), waits for all three to
//! reach a terminal state, then joins them through `ReportIntegration`.
//! Stage failures are recorded on the [`AnalysisRun`] and never abort
//! sibling stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use equilens_analysis::{AnalysisConfig, AnalysisPipeline, Depth};
//! use equilens_llm::providers::OpenAIProvider;
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AnalysisConfig::builder()
//!         .model("gpt-4o-mini")
//!         .build()?;
//!     let generator = Arc::new(OpenAIProvider::from_env()?);
//!
//!     let pipeline = AnalysisPipeline::new(config, generator).await?;
//!     let run = pipeline
//!         .analyze("AAPL", Utc::now().date_naive(), Depth::Standard)
//!         .await?;
//!
//!     println!("{}", run.render_markdown());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ProviderSettings, StageSettings};
pub use data::{DataSourceManager, DataSourceProvider};
pub use error::{AnalysisError, Result};
pub use pipeline::AnalysisPipeline;
pub use stages::{AnalysisStage, StageContext};
pub use state::{
    AnalysisRun, Depth, Recommendation, StageName, StageResult, TargetPriceRange,
};
