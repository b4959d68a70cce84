//! Analysis stages
//!
//! Three independent stages fetch data, derive ratios and produce a
//! narrative section; the integration stage merges whatever subset of
//! them completed. All four implement [`AnalysisStage`].

pub mod financial_metrics;
pub mod industry_comparison;
pub mod integration;
pub mod valuation;

pub use financial_metrics::FinancialMetricsStage;
pub use industry_comparison::IndustryComparisonStage;
pub use integration::{IntegrationFindings, IntegrationStage};
pub use valuation::ValuationStage;

use crate::config::StageSettings;
use crate::data::ProviderProvenance;
use crate::error::{AnalysisError, Result};
use crate::prompts;
use crate::state::{AnalysisRun, Depth, StageName, StageResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use equilens_llm::{GenerationRequest, TextGenerator};
use tracing::{debug, warn};

/// Placeholder substituted for a failed upstream section
pub const DATA_MISSING: &str = "(data missing)";

/// Immutable per-run inputs shared by every stage
#[derive(Debug, Clone)]
pub struct StageContext {
    pub ticker: String,
    pub analysis_date: NaiveDate,
    pub depth: Depth,
}

/// One unit of analysis
///
/// The three independent stages ignore `run`; integration reads its
/// predecessors' outcomes from it. No stage writes to `run` itself, the
/// orchestrator owns all mutation.
#[async_trait]
pub trait AnalysisStage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, ctx: &StageContext, run: &AnalysisRun) -> Result<StageResult>;
}

/// Call the text generator, retrying once with a directive prompt when
/// the first response is a decline
///
/// A transport error fails immediately with no retry; only a successful
/// call that carries no usable text triggers the second attempt. The
/// retry embeds the stage's computed figures verbatim. A second decline
/// is final.
pub(crate) async fn generate_with_retry(
    generator: &dyn TextGenerator,
    stage: StageName,
    settings: &StageSettings,
    model: &str,
    depth: Depth,
    prompt: String,
    figures: &serde_json::Value,
) -> Result<String> {
    let request = GenerationRequest::builder(model)
        .system(prompts::system_prompt(stage))
        .prompt(prompt.clone())
        .max_tokens(depth.token_budget(settings.max_tokens))
        .temperature(settings.temperature)
        .build();

    let response = generator.generate(request).await?;
    if response.is_actionable() {
        return Ok(response.text);
    }

    warn!(%stage, "generation declined, retrying once with directive prompt");

    let figures_json = serde_json::to_string_pretty(figures)?;
    let retry = GenerationRequest::builder(model)
        .system(prompts::system_prompt(stage))
        .prompt(prompts::directive_retry_prompt(&prompt, &figures_json))
        .max_tokens(depth.token_budget(settings.max_tokens))
        .temperature(settings.temperature)
        .build();

    let response = generator.generate(retry).await?;
    if response.is_actionable() {
        debug!(%stage, "directive retry produced content");
        return Ok(response.text);
    }

    Err(AnalysisError::GenerationDeclined { stage })
}

/// Transparency footer naming the provider that answered each request
///
/// Every stage appends this to its report text. Only successful attempts
/// are listed; repeats from overlapping fetch trails collapse to the
/// first occurrence. Empty when nothing succeeded.
pub(crate) fn data_sources_note(
    sources: &[ProviderProvenance],
    analysis_date: NaiveDate,
) -> String {
    let mut pairs: Vec<String> = Vec::new();
    for attempt in sources.iter().filter(|a| a.succeeded) {
        let pair = format!(
            "{} via {}",
            attempt.request.as_str().replace('_', " "),
            attempt.provider
        );
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    if pairs.is_empty() {
        return String::new();
    }
    format!(
        "\n\n---\nData sources: {}. Analysis date: {analysis_date}.",
        pairs.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RequestKind;
    use crate::testing::ScriptedGenerator;
    use async_trait::async_trait;
    use equilens_llm::{GenerationError, GenerationResponse, StopReason, TokenUsage};
    use mockall::mock;
    use serde_json::json;

    mock! {
        Generator {}

        #[async_trait]
        impl TextGenerator for Generator {
            async fn generate(
                &self,
                request: GenerationRequest,
            ) -> equilens_llm::Result<GenerationResponse>;
            fn name(&self) -> &str;
        }
    }

    fn settings() -> StageSettings {
        StageSettings::analyst()
    }

    #[tokio::test]
    async fn test_actionable_first_response_needs_no_retry() {
        let generator = ScriptedGenerator::always("solid analysis");

        let text = generate_with_retry(
            &generator,
            StageName::FinancialMetrics,
            &settings(),
            "gpt-4o-mini",
            Depth::Standard,
            "context".to_string(),
            &json!({"roe": 12.5}),
        )
        .await
        .unwrap();

        assert_eq!(text, "solid analysis");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_decline_retries_once_with_embedded_figures() {
        let generator = ScriptedGenerator::script(vec!["", "directive answer"]);

        let text = generate_with_retry(
            &generator,
            StageName::FinancialMetrics,
            &settings(),
            "gpt-4o-mini",
            Depth::Standard,
            "context".to_string(),
            &json!({"roe": 12.5}),
        )
        .await
        .unwrap();

        assert_eq!(text, "directive answer");
        assert_eq!(generator.call_count(), 2);

        let retry_request = &generator.requests()[1];
        assert!(retry_request.prompt.contains("\"roe\": 12.5"));
        assert!(retry_request.prompt.contains("must produce the analysis now"));
    }

    #[tokio::test]
    async fn test_two_declines_are_final() {
        let generator = ScriptedGenerator::script(vec!["", ""]);

        let err = generate_with_retry(
            &generator,
            StageName::ValuationAnalysis,
            &settings(),
            "gpt-4o-mini",
            Depth::Standard,
            "context".to_string(),
            &json!({}),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::GenerationDeclined {
                stage: StageName::ValuationAnalysis
            }
        ));
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_fails_without_retry() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(GenerationError::RequestFailed("boom".to_string())));

        let err = generate_with_retry(
            &generator,
            StageName::FinancialMetrics,
            &settings(),
            "gpt-4o-mini",
            Depth::Standard,
            "context".to_string(),
            &json!({}),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AnalysisError::Generation(_)));
    }

    #[test]
    fn test_data_sources_note_lists_each_success_once() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        let sources = vec![
            ProviderProvenance::new("yahoo_finance", RequestKind::FinancialStatements, false),
            ProviderProvenance::new("alpha_vantage", RequestKind::FinancialStatements, true),
            ProviderProvenance::new("yahoo_finance", RequestKind::CompanyInfo, true),
            // Same fetch repeated through another stage's trail
            ProviderProvenance::new("alpha_vantage", RequestKind::FinancialStatements, true),
        ];

        let note = data_sources_note(&sources, date);

        assert_eq!(
            note,
            "\n\n---\nData sources: financial statements via alpha_vantage; \
             company info via yahoo_finance. Analysis date: 2024-06-28."
        );
    }

    #[test]
    fn test_data_sources_note_empty_without_successes() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        let sources = vec![ProviderProvenance::new(
            "yahoo_finance",
            RequestKind::PriceHistory,
            false,
        )];

        assert!(data_sources_note(&sources, date).is_empty());
    }

    #[tokio::test]
    async fn test_depth_scales_requested_tokens() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|request| request.max_tokens == 3000)
            .times(1)
            .returning(|_| {
                Ok(GenerationResponse {
                    text: "deep analysis".to_string(),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage {
                        input_tokens: 1,
                        output_tokens: 1,
                    },
                })
            });

        let text = generate_with_retry(
            &generator,
            StageName::FinancialMetrics,
            &settings(),
            "gpt-4o-mini",
            Depth::Comprehensive,
            "context".to_string(),
            &json!({}),
        )
        .await
        .unwrap();

        assert_eq!(text, "deep analysis");
    }
}
