//! Report integration stage
//!
//! Joins whatever the three analysis stages produced into one synthesis,
//! then lifts a recommendation, a target price range and a confidence
//! score out of the generated text.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::metrics::ratios;
use crate::prompts;
use crate::stages::{
    data_sources_note, generate_with_retry, AnalysisStage, StageContext, DATA_MISSING,
};
use crate::state::{AnalysisRun, Depth, Recommendation, StageName, StageResult, TargetPriceRange};
use async_trait::async_trait;
use equilens_llm::TextGenerator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// What integration distilled from the synthesis text
///
/// Stored as the integration stage's `raw_data` so the orchestrator can
/// lift the fields onto the run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationFindings {
    pub recommendation: Recommendation,
    pub target_price_range: Option<TargetPriceRange>,
    pub confidence_score: f64,
}

impl IntegrationFindings {
    /// Recover the findings from a completed integration result
    pub fn from_result(result: &StageResult) -> Option<Self> {
        serde_json::from_value(result.raw_data.clone()).ok()
    }
}

/// Merges the completed analyses into the final report
pub struct IntegrationStage {
    generator: Arc<dyn TextGenerator>,
    config: Arc<AnalysisConfig>,
}

impl IntegrationStage {
    pub fn new(generator: Arc<dyn TextGenerator>, config: Arc<AnalysisConfig>) -> Self {
        Self { generator, config }
    }
}

#[async_trait]
impl AnalysisStage for IntegrationStage {
    fn name(&self) -> StageName {
        StageName::ReportIntegration
    }

    #[instrument(skip_all, fields(ticker = %ctx.ticker))]
    async fn run(&self, ctx: &StageContext, run: &AnalysisRun) -> Result<StageResult> {
        if run.completed_leaf_count() == 0 {
            return Err(AnalysisError::InsufficientInput);
        }

        let mut sections = Vec::new();
        let mut sources = Vec::new();
        let mut figures = serde_json::Map::new();
        for stage in StageName::LEAVES {
            match run.stage_result(stage) {
                Some(result) => {
                    sections.push((stage.title().to_string(), result.report_text.clone()));
                    sources.extend(result.data_sources.iter().cloned());
                    figures.insert(stage.as_str().to_string(), result.raw_data.clone());
                }
                None => sections.push((stage.title().to_string(), DATA_MISSING.to_string())),
            }
        }
        let figures = serde_json::Value::Object(figures);

        let prompt = prompts::integration_prompt(&ctx.ticker, ctx.analysis_date, &sections);
        let synthesis = generate_with_retry(
            self.generator.as_ref(),
            self.name(),
            &self.config.integration,
            &self.config.model,
            ctx.depth,
            prompt,
            &figures,
        )
        .await?;

        let current_price = run
            .stage_result(StageName::ValuationAnalysis)
            .and_then(|result| result.raw_data.get(ratios::LATEST_CLOSE))
            .and_then(serde_json::Value::as_f64);

        let findings = IntegrationFindings {
            recommendation: extract_recommendation(&synthesis),
            target_price_range: extract_price_range(&synthesis, current_price),
            confidence_score: confidence_score(run),
        };

        // The union note goes on after extraction so footer text never
        // feeds the keyword scan
        let mut report_text = synthesis;
        report_text.push_str(&data_sources_note(&sources, ctx.analysis_date));

        Ok(StageResult {
            stage: self.name(),
            report_text,
            raw_data: serde_json::to_value(&findings)?,
            data_sources: sources,
            depth: ctx.depth,
        })
    }
}

/// First matching keyword wins; "strong buy" must be checked before "buy"
/// since the latter is a substring of the former. Unmatched text reads as
/// a hold.
fn extract_recommendation(text: &str) -> Recommendation {
    let lowered = text.to_lowercase();
    if lowered.contains("strong buy") {
        Recommendation::StrongBuy
    } else if lowered.contains("buy") {
        Recommendation::Buy
    } else if lowered.contains("hold") {
        Recommendation::Hold
    } else if lowered.contains("sell") {
        Recommendation::Sell
    } else {
        Recommendation::Hold
    }
}

/// Pull "Target Price Range: $LOW - $HIGH" out of the synthesis
///
/// Absent or unparseable ranges stay `None`; a range is never invented
/// for text that does not state one.
fn extract_price_range(text: &str, current: Option<f64>) -> Option<TargetPriceRange> {
    let pattern = Regex::new(
        r"(?i)target\s+price\s+range[^0-9$]{0,40}\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:-|to)\s*\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
    )
    .ok()?;
    let caps = pattern.captures(text)?;
    let low = parse_amount(caps.get(1)?.as_str())?;
    let high = parse_amount(caps.get(2)?.as_str())?;
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    Some(TargetPriceRange { low, high, current })
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

/// Breadth of completed analyses plus a bonus for comprehensive ones,
/// clamped to the unit interval
fn confidence_score(run: &AnalysisRun) -> f64 {
    let completed = run.completed_leaf_count() as f64;
    let comprehensive = StageName::LEAVES
        .iter()
        .filter_map(|stage| run.stage_result(*stage))
        .filter(|result| result.depth == Depth::Comprehensive)
        .count() as f64;
    (completed / 3.0 + 0.1 * comprehensive).clamp(0.0, 1.0)
}
