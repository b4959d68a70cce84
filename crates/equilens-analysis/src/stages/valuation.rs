//! Valuation stage

use crate::config::AnalysisConfig;
use crate::data::DataSourceManager;
use crate::error::{AnalysisError, Result};
use crate::metrics;
use crate::prompts;
use crate::stages::{data_sources_note, generate_with_retry, AnalysisStage, StageContext};
use crate::state::{AnalysisRun, StageName, StageResult};
use async_trait::async_trait;
use chrono::Duration;
use equilens_llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Length of the price window examined for valuation, in days.
const PRICE_WINDOW_DAYS: i64 = 365;

/// Values the stock from trailing-year prices and the latest statements
///
/// Prices and statements are both required; the company profile only feeds
/// per-share metrics and is fetched best-effort.
pub struct ValuationStage {
    manager: Arc<DataSourceManager>,
    generator: Arc<dyn TextGenerator>,
    config: Arc<AnalysisConfig>,
}

impl ValuationStage {
    pub fn new(
        manager: Arc<DataSourceManager>,
        generator: Arc<dyn TextGenerator>,
        config: Arc<AnalysisConfig>,
    ) -> Self {
        Self {
            manager,
            generator,
            config,
        }
    }
}

#[async_trait]
impl AnalysisStage for ValuationStage {
    fn name(&self) -> StageName {
        StageName::ValuationAnalysis
    }

    #[instrument(skip_all, fields(ticker = %ctx.ticker))]
    async fn run(&self, ctx: &StageContext, _run: &AnalysisRun) -> Result<StageResult> {
        let start = ctx.analysis_date - Duration::days(PRICE_WINDOW_DAYS);
        let prices = self
            .manager
            .price_history(&ctx.ticker, start, ctx.analysis_date)
            .await?;
        let statements = self.manager.financial_statements(&ctx.ticker).await?;

        let mut sources = prices.attempts;
        sources.extend(statements.attempts);

        let profile = match self.manager.company_info(&ctx.ticker).await {
            Ok(fetched) => {
                sources.extend(fetched.attempts);
                Some(fetched.payload)
            }
            Err(AnalysisError::AllProvidersFailed { attempts, .. }) => {
                debug!(ticker = %ctx.ticker, "profile unavailable, per-share metrics omitted");
                sources.extend(attempts);
                None
            }
            Err(err) => {
                debug!(ticker = %ctx.ticker, error = %err, "profile unavailable");
                None
            }
        };

        let valuation =
            metrics::valuation_metrics(&prices.payload, &statements.payload, profile.as_ref());
        let figures = serde_json::to_value(&valuation)?;

        let prompt = prompts::valuation_prompt(
            &ctx.ticker,
            ctx.analysis_date,
            ctx.depth,
            &valuation,
            profile.as_ref(),
        );

        let mut report_text = generate_with_retry(
            self.generator.as_ref(),
            self.name(),
            &self.config.valuation,
            &self.config.model,
            ctx.depth,
            prompt,
            &figures,
        )
        .await?;
        report_text.push_str(&data_sources_note(&sources, ctx.analysis_date));

        Ok(StageResult {
            stage: self.name(),
            report_text,
            raw_data: figures,
            data_sources: sources,
            depth: ctx.depth,
        })
    }
}
