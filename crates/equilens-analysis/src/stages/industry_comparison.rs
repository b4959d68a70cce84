//! Industry comparison stage

use crate::config::AnalysisConfig;
use crate::data::DataSourceManager;
use crate::error::Result;
use crate::metrics;
use crate::prompts;
use crate::stages::{data_sources_note, generate_with_retry, AnalysisStage, StageContext};
use crate::state::{AnalysisRun, StageName, StageResult};
use async_trait::async_trait;
use equilens_llm::TextGenerator;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

/// Benchmarks the company against its industry
///
/// Needs both the company profile (for sector and industry) and the
/// financial statements (for the ratios being benchmarked); either fetch
/// failing fails the stage.
pub struct IndustryComparisonStage {
    manager: Arc<DataSourceManager>,
    generator: Arc<dyn TextGenerator>,
    config: Arc<AnalysisConfig>,
}

impl IndustryComparisonStage {
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
impl AnalysisStage for IndustryComparisonStage {
    fn name(&self) -> StageName {
        StageName::IndustryComparison
    }

    #[instrument(skip_all, fields(ticker = %ctx.ticker))]
    async fn run(&self, ctx: &StageContext, _run: &AnalysisRun) -> Result<StageResult> {
        let profile = self.manager.company_info(&ctx.ticker).await?;
        let statements = self.manager.financial_statements(&ctx.ticker).await?;

        let mut sources = profile.attempts;
        sources.extend(statements.attempts);

        let ratios = metrics::financial_ratios(&statements.payload);
        let figures = json!({
            "profile": profile.payload,
            "ratios": ratios,
        });

        let prompt = prompts::industry_comparison_prompt(
            &ctx.ticker,
            ctx.analysis_date,
            ctx.depth,
            &profile.payload,
            &ratios,
        );

        let mut report_text = generate_with_retry(
            self.generator.as_ref(),
            self.name(),
            &self.config.industry_comparison,
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
