//! Error types for the analysis pipeline

use crate::data::{ProviderProvenance, RequestKind};
use crate::state::StageName;
use thiserror::Error;

/// Analysis pipeline errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing or invalid ticker; fatal, nothing is scheduled
    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),

    /// Configuration rejected before the run started
    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    /// No provider was eligible to try for this request
    #[error("No data providers configured for {request}")]
    NoProvidersConfigured { request: RequestKind },

    /// Every eligible provider was tried and failed
    #[error("All providers failed for {request}: {last_error}")]
    AllProvidersFailed {
        request: RequestKind,
        attempts: Vec<ProviderProvenance>,
        last_error: String,
    },

    /// Text generation produced no actionable content after the single retry
    #[error("Text generation declined to produce content for {stage}")]
    GenerationDeclined { stage: StageName },

    /// Integration had no completed analyses to merge
    #[error("Report integration has no completed analyses to merge")]
    InsufficientInput,

    /// A stage exceeded its configured deadline
    #[error("Stage {stage} timed out after {seconds}s")]
    StageTimeout { stage: StageName, seconds: u64 },

    /// Provider API call failed
    #[error("{provider} error: {message}")]
    ProviderApi { provider: String, message: String },

    /// Provider answered with nothing usable
    #[error("{provider} returned an empty payload for {request}")]
    EmptyPayload {
        provider: String,
        request: RequestKind,
    },

    /// Rate limit exceeded for a provider
    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level text-generation failure
    #[error("Text generation error: {0}")]
    Generation(#[from] equilens_llm::GenerationError),
}

impl AnalysisError {
    /// Stable machine-readable label for error records and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTicker(_) => "invalid_ticker",
            Self::ConfigInvalid(_) => "config_invalid",
            Self::NoProvidersConfigured { .. } => "no_providers_configured",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::GenerationDeclined { .. } => "generation_declined",
            Self::InsufficientInput => "insufficient_input",
            Self::StageTimeout { .. } => "stage_timeout",
            Self::ProviderApi { .. } => "provider_api",
            Self::EmptyPayload { .. } => "empty_payload",
            Self::RateLimited { .. } => "rate_limited",
            Self::Network(_) => "network",
            Self::Json(_) => "json",
            Self::Generation(_) => "generation",
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
