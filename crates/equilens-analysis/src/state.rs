//! Run state: the accumulating record of one analysis invocation

use crate::data::ProviderProvenance;
use crate::error::AnalysisError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// The four stages of a run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    FinancialMetrics,
    IndustryComparison,
    ValuationAnalysis,
    ReportIntegration,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialMetrics => "financial_metrics",
            Self::IndustryComparison => "industry_comparison",
            Self::ValuationAnalysis => "valuation_analysis",
            Self::ReportIntegration => "report_integration",
        }
    }

    /// Human-readable section title
    pub fn title(&self) -> &'static str {
        match self {
            Self::FinancialMetrics => "Financial Metrics",
            Self::IndustryComparison => "Industry Comparison",
            Self::ValuationAnalysis => "Valuation Analysis",
            Self::ReportIntegration => "Report Integration",
        }
    }

    /// The three stages that run concurrently before integration
    pub const LEAVES: [StageName; 3] = [
        Self::FinancialMetrics,
        Self::IndustryComparison,
        Self::ValuationAnalysis,
    ];
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested thoroughness of a run
///
/// Depth scales the generation token budget and feeds the confidence
/// bonus for comprehensive analyses.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Basic,
    #[default]
    Standard,
    Comprehensive,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Token budget for a stage given its configured base limit
    pub fn token_budget(&self, base: usize) -> usize {
        match self {
            Self::Basic => base / 2,
            Self::Standard => base,
            Self::Comprehensive => base + base / 2,
        }
    }
}

impl std::str::FromStr for Depth {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(AnalysisError::ConfigInvalid(format!(
                "Unknown analysis depth: {other:?} (expected basic, standard or comprehensive)"
            ))),
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Investment stance extracted from the synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::StrongBuy => "Strong Buy",
            Self::Buy => "Buy",
            Self::Hold => "Hold",
            Self::Sell => "Sell",
            Self::StrongSell => "Strong Sell",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Target price range extracted from the synthesis
///
/// Only present when the synthesis text carried a parseable range; never
/// fabricated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPriceRange {
    pub low: f64,
    pub high: f64,
    /// Latest observed price, when the valuation stage produced one
    pub current: Option<f64>,
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: StageName,
    /// Stable label, see [`AnalysisError::kind`]
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn from_error(stage: StageName, error: &AnalysisError) -> Self {
        Self {
            stage,
            kind: error.kind().to_string(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// Output of one completed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageName,
    /// Narrative produced by the text-generation collaborator
    pub report_text: String,
    /// Structured payload behind the narrative (ratios, extracted findings)
    pub raw_data: serde_json::Value,
    /// Which providers answered which requests, in attempt order
    pub data_sources: Vec<ProviderProvenance>,
    pub depth: Depth,
}

/// Terminal state of a stage that ran
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed(StageResult),
    Failed(ErrorRecord),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn result(&self) -> Option<&StageResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed(_) => None,
        }
    }
}

/// The accumulating record of one pipeline invocation
///
/// Created at pipeline entry, filled in by the orchestrator as stages
/// reach their terminal states, immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub ticker: String,
    pub analysis_date: NaiveDate,
    pub depth: Depth,
    pub started_at: DateTime<Utc>,

    /// Absent key: the stage never ran. Present: it ran and either
    /// completed or failed.
    pub stage_results: BTreeMap<StageName, StageOutcome>,
    pub completed_stages: BTreeSet<StageName>,
    /// One record per failure, in detection order
    pub errors: Vec<ErrorRecord>,
    pub stage_durations: BTreeMap<StageName, Duration>,

    /// Set only when report integration completed
    pub recommendation: Option<Recommendation>,
    /// Set only when report integration completed and the synthesis
    /// carried a parseable range
    pub target_price_range: Option<TargetPriceRange>,
    /// Set only when report integration completed; in [0, 1]
    pub confidence_score: Option<f64>,
}

impl AnalysisRun {
    pub fn new(ticker: impl Into<String>, analysis_date: NaiveDate, depth: Depth) -> Self {
        Self {
            ticker: ticker.into(),
            analysis_date,
            depth,
            started_at: Utc::now(),
            stage_results: BTreeMap::new(),
            completed_stages: BTreeSet::new(),
            errors: Vec::new(),
            stage_durations: BTreeMap::new(),
            recommendation: None,
            target_price_range: None,
            confidence_score: None,
        }
    }

    /// Record a stage that completed
    pub fn record_success(&mut self, result: StageResult, duration: Duration) {
        let stage = result.stage;
        self.completed_stages.insert(stage);
        self.stage_results.insert(stage, StageOutcome::Completed(result));
        self.stage_durations.insert(stage, duration);
    }

    /// Record a stage that ran and failed
    ///
    /// The caller owns appending the matching record to `errors`; the
    /// error list preserves detection order across concurrent stages,
    /// which the keyed map cannot.
    pub fn record_failure(&mut self, record: ErrorRecord, duration: Duration) {
        let stage = record.stage;
        self.stage_results.insert(stage, StageOutcome::Failed(record));
        self.stage_durations.insert(stage, duration);
    }

    /// Completed result for a stage, if it completed
    pub fn stage_result(&self, stage: StageName) -> Option<&StageResult> {
        self.stage_results.get(&stage).and_then(StageOutcome::result)
    }

    /// How many of the three analysis stages completed
    pub fn completed_leaf_count(&self) -> usize {
        StageName::LEAVES
            .iter()
            .filter(|s| self.completed_stages.contains(s))
            .count()
    }

    /// Fully successful: integration completed and nothing failed
    pub fn success(&self) -> bool {
        self.completed_stages.contains(&StageName::ReportIntegration) && self.errors.is_empty()
    }

    /// Render the run as a markdown report
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Equity Analysis: {}\n\n", self.ticker));
        out.push_str(&format!("- Date: {}\n", self.analysis_date));
        out.push_str(&format!("- Depth: {}\n", self.depth));
        out.push_str(&format!(
            "- Outcome: {}\n",
            if self.success() {
                "success"
            } else if self.completed_stages.contains(&StageName::ReportIntegration) {
                "degraded"
            } else {
                "failed"
            }
        ));
        if let Some(score) = self.confidence_score {
            out.push_str(&format!("- Confidence: {score:.2}\n"));
        }
        if let Some(rec) = self.recommendation {
            out.push_str(&format!("- Recommendation: {rec}\n"));
        }
        if let Some(range) = self.target_price_range {
            match range.current {
                Some(current) => out.push_str(&format!(
                    "- Target price range: {:.2} - {:.2} (current {current:.2})\n",
                    range.low, range.high
                )),
                None => out.push_str(&format!(
                    "- Target price range: {:.2} - {:.2}\n",
                    range.low, range.high
                )),
            }
        }
        out.push('\n');

        for stage in StageName::LEAVES {
            out.push_str(&format!("## {}\n\n", stage.title()));
            match self.stage_result(stage) {
                Some(result) => {
                    out.push_str(&result.report_text);
                    out.push_str("\n\n");
                }
                None => out.push_str("(data missing)\n\n"),
            }
        }

        out.push_str("## Integrated Report\n\n");
        match self.stage_result(StageName::ReportIntegration) {
            Some(result) => {
                out.push_str(&result.report_text);
                out.push_str("\n\n");
            }
            None => out.push_str("(no integrated report)\n\n"),
        }

        if !self.errors.is_empty() {
            out.push_str("## Errors\n\n");
            for record in &self.errors {
                out.push_str(&format!("- [{}] {}\n", record.stage, record.message));
            }
        }

        out
    }
}
