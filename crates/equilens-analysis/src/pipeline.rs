//! Pipeline orchestration
//!
//! Fans the three analysis stages out as concurrent tasks, waits for all
//! of them to reach a terminal state, then runs report integration over
//! whatever subset completed. Stage failures degrade the run; only an
//! invalid ticker or invalid configuration abort it.

use crate::config::AnalysisConfig;
use crate::data::DataSourceManager;
use crate::error::{AnalysisError, Result};
use crate::stages::{
    AnalysisStage, FinancialMetricsStage, IndustryComparisonStage, IntegrationFindings,
    IntegrationStage, StageContext, ValuationStage,
};
use crate::state::{AnalysisRun, Depth, ErrorRecord, StageName, StageResult};
use chrono::NaiveDate;
use equilens_llm::TextGenerator;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Runs single-ticker analyses end to end
///
/// Construction validates the configuration and fixes the set of enabled
/// stages; each [`analyze`](Self::analyze) call is independent and the
/// pipeline can be shared across tasks.
pub struct AnalysisPipeline {
    config: Arc<AnalysisConfig>,
    leaves: Vec<Box<dyn AnalysisStage>>,
    integration: IntegrationStage,
}

impl AnalysisPipeline {
    /// Build a pipeline with the default provider set for the configuration
    pub async fn new(config: AnalysisConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        config.validate()?;
        let manager = Arc::new(DataSourceManager::from_config(&config).await?);
        Ok(Self::assemble(Arc::new(config), manager, generator))
    }

    /// Build a pipeline around an existing data source manager
    pub fn with_manager(
        config: AnalysisConfig,
        manager: Arc<DataSourceManager>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(Arc::new(config), manager, generator))
    }

    fn assemble(
        config: Arc<AnalysisConfig>,
        manager: Arc<DataSourceManager>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let mut leaves: Vec<Box<dyn AnalysisStage>> = Vec::new();
        for stage in config.enabled_leaves() {
            match stage {
                StageName::FinancialMetrics => leaves.push(Box::new(FinancialMetricsStage::new(
                    manager.clone(),
                    generator.clone(),
                    config.clone(),
                ))),
                StageName::IndustryComparison => {
                    leaves.push(Box::new(IndustryComparisonStage::new(
                        manager.clone(),
                        generator.clone(),
                        config.clone(),
                    )))
                }
                StageName::ValuationAnalysis => leaves.push(Box::new(ValuationStage::new(
                    manager.clone(),
                    generator.clone(),
                    config.clone(),
                ))),
                StageName::ReportIntegration => continue,
            }
        }
        let integration = IntegrationStage::new(generator, config.clone());
        Self {
            config,
            leaves,
            integration,
        }
    }

    /// Run a full analysis for one ticker
    ///
    /// Returns `Err` only for an invalid ticker; provider and generation
    /// failures are recorded on the returned run instead.
    #[instrument(skip(self))]
    pub async fn analyze(
        &self,
        ticker: &str,
        date: NaiveDate,
        depth: Depth,
    ) -> Result<AnalysisRun> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(AnalysisError::InvalidTicker(ticker));
        }

        let estimate = self.config.estimated_cost(depth);
        if estimate > self.config.cost_ceiling {
            warn!(
                estimate,
                ceiling = self.config.cost_ceiling,
                "estimated generation cost exceeds the configured ceiling"
            );
        }

        info!(ticker, %depth, "starting analysis run");
        let ctx = StageContext {
            ticker: ticker.clone(),
            analysis_date: date,
            depth,
        };
        let mut run = AnalysisRun::new(ticker, date, depth);

        // Failures append here in detection order; the per-stage map alone
        // cannot preserve which error surfaced first.
        let error_sink: Mutex<Vec<ErrorRecord>> = Mutex::new(Vec::new());

        let leaf_outcomes = {
            let ctx = &ctx;
            let run = &run;
            let sink = &error_sink;
            join_all(self.leaves.iter().map(|stage| async move {
                let settings = self.config.stage_settings(stage.name());
                let (name, outcome, duration) =
                    Self::run_bounded(stage.as_ref(), ctx, run, settings.timeout).await;
                match outcome {
                    Ok(result) => (Ok(result), duration),
                    Err(err) => {
                        warn!(stage = %name, error = %err, "analysis stage failed");
                        let record = ErrorRecord::from_error(name, &err);
                        sink.lock().await.push(record.clone());
                        (Err(record), duration)
                    }
                }
            }))
            .await
        };

        for (outcome, duration) in leaf_outcomes {
            match outcome {
                Ok(result) => run.record_success(result, duration),
                Err(record) => run.record_failure(record, duration),
            }
        }
        run.errors = error_sink.into_inner();

        let settings = self.config.stage_settings(StageName::ReportIntegration);
        let (name, outcome, duration) =
            Self::run_bounded(&self.integration, &ctx, &run, settings.timeout).await;
        match outcome {
            Ok(result) => {
                if let Some(findings) = IntegrationFindings::from_result(&result) {
                    run.recommendation = Some(findings.recommendation);
                    run.target_price_range = findings.target_price_range;
                    run.confidence_score = Some(findings.confidence_score);
                }
                run.record_success(result, duration);
            }
            Err(err) => {
                warn!(stage = %name, error = %err, "report integration failed");
                let record = ErrorRecord::from_error(name, &err);
                run.errors.push(record.clone());
                run.record_failure(record, duration);
            }
        }

        info!(
            ticker = %run.ticker,
            success = run.success(),
            completed_leaves = run.completed_leaf_count(),
            "analysis run finished"
        );
        Ok(run)
    }

    /// Run one stage under its configured deadline
    async fn run_bounded(
        stage: &dyn AnalysisStage,
        ctx: &StageContext,
        run: &AnalysisRun,
        limit: Duration,
    ) -> (StageName, Result<StageResult>, Duration) {
        let name = stage.name();
        let started = Instant::now();
        let outcome = match timeout(limit, stage.run(ctx, run)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AnalysisError::StageTimeout {
                stage: name,
                seconds: limit.as_secs(),
            }),
        };
        (name, outcome, started.elapsed())
    }
}
