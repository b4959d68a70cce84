//! Financial metrics stage

use crate::config::AnalysisConfig;
use crate::data::DataSourceManager;
use crate::error::{AnalysisError, Result};
use crate::metrics;
use crate::prompts;
use crate::stages::{data_sources_note, generate_with_retry, AnalysisStage, StageContext};
use crate::state::{AnalysisRun, StageName, StageResult};
use async_trait::async_trait;
use equilens_llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Analyzes profitability, solvency and growth from financial statements
///
/// Statements are required; the company profile is fetched best-effort
/// for prompt context only.
pub struct FinancialMetricsStage {
    manager: Arc<DataSourceManager>,
    generator: Arc<dyn TextGenerator>,
    config: Arc<AnalysisConfig>,
}

impl FinancialMetricsStage {
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
impl AnalysisStage for FinancialMetricsStage {
    fn name(&self) -> StageName {
        StageName::FinancialMetrics
    }

    #[instrument(skip_all, fields(ticker = %ctx.ticker))]
    async fn run(&self, ctx: &StageContext, _run: &AnalysisRun) -> Result<StageResult> {
        let statements = self.manager.financial_statements(&ctx.ticker).await?;
        let mut sources = statements.attempts;

        let profile = match self.manager.company_info(&ctx.ticker).await {
            Ok(fetched) => {
                sources.extend(fetched.attempts);
                Some(fetched.payload)
            }
            Err(AnalysisError::AllProvidersFailed { attempts, .. }) => {
                debug!("company profile unavailable, continuing without it");
                sources.extend(attempts);
                None
            }
            Err(_) => {
                debug!("company profile unavailable, continuing without it");
                None
            }
        };

        let ratios = metrics::financial_ratios(&statements.payload);
        let figures = serde_json::to_value(&ratios)?;

        let prompt = prompts::financial_metrics_prompt(
            &ctx.ticker,
            ctx.analysis_date,
            ctx.depth,
            &ratios,
            profile.as_ref(),
        );

        let mut report_text = generate_with_retry(
            self.generator.as_ref(),
            self.name(),
            &self.config.financial_metrics,
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
