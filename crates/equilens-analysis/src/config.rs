//! Configuration for analysis runs

use crate::error::{AnalysisError, Result};
use crate::state::{Depth, StageName};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Well-known provider names
pub const YAHOO_PROVIDER: &str = "yahoo_finance";
pub const ALPHA_VANTAGE_PROVIDER: &str = "alpha_vantage";

/// Per-stage generation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Whether the stage runs at all
    pub enabled: bool,

    /// Token budget at standard depth; scaled by the requested depth
    pub max_tokens: usize,

    /// Sampling temperature for the text generator
    pub temperature: f32,

    /// Wall-clock bound for the whole stage (fetch plus generation)
    pub timeout: Duration,
}

impl StageSettings {
    /// Defaults for the three independent analysis stages
    pub fn analyst() -> Self {
        Self {
            enabled: true,
            max_tokens: 2000,
            temperature: 0.7,
            timeout: Duration::from_secs(300),
        }
    }

    /// Defaults for report integration, which reads all upstream output
    pub fn integration() -> Self {
        Self {
            enabled: true,
            max_tokens: 3000,
            temperature: 0.7,
            timeout: Duration::from_secs(600),
        }
    }
}

/// One data provider slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider name, matched against `DataSourceProvider::name()`
    pub name: String,

    /// Disabled providers are never registered with the manager
    pub enabled: bool,

    /// 1..=10, lower numbers are tried first
    pub priority: u8,

    /// Per-request timeout for this provider
    pub timeout: Duration,

    /// Optional client-side request budget per minute
    pub rate_limit_per_minute: Option<u32>,
}

impl ProviderSettings {
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
            timeout: Duration::from_secs(30),
            rate_limit_per_minute: None,
        }
    }

    /// Yahoo Finance slot (no API key required)
    pub fn yahoo() -> Self {
        Self::new(YAHOO_PROVIDER, 1)
    }

    /// Alpha Vantage slot; the free tier allows 5 requests per minute
    pub fn alpha_vantage() -> Self {
        Self {
            rate_limit_per_minute: Some(5),
            ..Self::new(ALPHA_VANTAGE_PROVIDER, 2)
        }
    }
}

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Model identifier passed to the text generator
    pub model: String,

    /// Financial metrics stage
    pub financial_metrics: StageSettings,

    /// Industry comparison stage
    pub industry_comparison: StageSettings,

    /// Valuation stage
    pub valuation: StageSettings,

    /// Report integration stage
    pub integration: StageSettings,

    /// Provider slots in registration order
    pub providers: Vec<ProviderSettings>,

    /// Soft ceiling on estimated generation cost per run, in USD
    pub cost_ceiling: f64,

    /// Cost per 1000 generated tokens, in USD
    pub cost_per_1k_tokens: f64,

    /// Whether fetched payloads are served from the lookaside cache
    pub cache_enabled: bool,

    /// Cache TTL for financial statements
    pub cache_ttl_statements: Duration,

    /// Cache TTL for company profiles
    pub cache_ttl_profile: Duration,

    /// Cache TTL for price history
    pub cache_ttl_prices: Duration,

    /// Alpha Vantage API key (optional)
    pub alpha_vantage_api_key: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            financial_metrics: StageSettings::analyst(),
            industry_comparison: StageSettings::analyst(),
            valuation: StageSettings::analyst(),
            integration: StageSettings::integration(),
            providers: vec![
                ProviderSettings::yahoo(),
                ProviderSettings {
                    enabled: false,
                    ..ProviderSettings::alpha_vantage()
                },
            ],
            cost_ceiling: 5.0,
            cost_per_1k_tokens: 0.002,
            cache_enabled: true,
            cache_ttl_statements: Duration::from_secs(3600), // 1 hour
            cache_ttl_profile: Duration::from_secs(3600),    // 1 hour
            cache_ttl_prices: Duration::from_secs(300),      // 5 minutes
            alpha_vantage_api_key: None,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Load the Alpha Vantage API key from the environment and enable the
    /// provider slot when a key is found
    pub fn with_env_api_key(mut self) -> Self {
        if let Ok(key) = std::env::var("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
            for slot in &mut self.providers {
                if slot.name == ALPHA_VANTAGE_PROVIDER {
                    slot.enabled = true;
                }
            }
        }
        self
    }

    /// Settings for one stage
    pub fn stage_settings(&self, stage: StageName) -> &StageSettings {
        match stage {
            StageName::FinancialMetrics => &self.financial_metrics,
            StageName::IndustryComparison => &self.industry_comparison,
            StageName::ValuationAnalysis => &self.valuation,
            StageName::ReportIntegration => &self.integration,
        }
    }

    /// The independent stages that are switched on
    pub fn enabled_leaves(&self) -> Vec<StageName> {
        StageName::LEAVES
            .into_iter()
            .filter(|s| self.stage_settings(*s).enabled)
            .collect()
    }

    /// Provider slot by name
    pub fn provider_settings(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Upper-bound generation cost for one run at the given depth,
    /// assuming every enabled stage spends its full token budget
    pub fn estimated_cost(&self, depth: Depth) -> f64 {
        let mut tokens = 0usize;
        for stage in StageName::LEAVES {
            let settings = self.stage_settings(stage);
            if settings.enabled {
                tokens += depth.token_budget(settings.max_tokens);
            }
        }
        if self.integration.enabled {
            tokens += depth.token_budget(self.integration.max_tokens);
        }
        tokens as f64 / 1000.0 * self.cost_per_1k_tokens
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AnalysisError::ConfigInvalid(
                "model must not be empty".to_string(),
            ));
        }

        if !self.providers.iter().any(|p| p.enabled) {
            return Err(AnalysisError::ConfigInvalid(
                "at least one data provider must be enabled".to_string(),
            ));
        }

        if self.enabled_leaves().is_empty() {
            return Err(AnalysisError::ConfigInvalid(
                "at least one analysis stage must be enabled".to_string(),
            ));
        }

        if !self.integration.enabled {
            return Err(AnalysisError::ConfigInvalid(
                "report integration cannot be disabled".to_string(),
            ));
        }

        for slot in &self.providers {
            if !(1..=10).contains(&slot.priority) {
                return Err(AnalysisError::ConfigInvalid(format!(
                    "priority for {} must be between 1 and 10",
                    slot.name
                )));
            }
            if slot.timeout.is_zero() {
                return Err(AnalysisError::ConfigInvalid(format!(
                    "timeout for {} must be greater than zero",
                    slot.name
                )));
            }
        }

        for stage in [
            StageName::FinancialMetrics,
            StageName::IndustryComparison,
            StageName::ValuationAnalysis,
            StageName::ReportIntegration,
        ] {
            let settings = self.stage_settings(stage);
            if !settings.enabled {
                continue;
            }
            if settings.max_tokens == 0 {
                return Err(AnalysisError::ConfigInvalid(format!(
                    "max_tokens for {stage} must be greater than 0"
                )));
            }
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(AnalysisError::ConfigInvalid(format!(
                    "temperature for {stage} must be between 0.0 and 2.0"
                )));
            }
            if settings.timeout.is_zero() {
                return Err(AnalysisError::ConfigInvalid(format!(
                    "timeout for {stage} must be greater than zero"
                )));
            }
        }

        if self.cost_ceiling <= 0.0 {
            return Err(AnalysisError::ConfigInvalid(
                "cost_ceiling must be greater than 0".to_string(),
            ));
        }

        if self.cost_per_1k_tokens < 0.0 {
            return Err(AnalysisError::ConfigInvalid(
                "cost_per_1k_tokens must not be negative".to_string(),
            ));
        }

        // Even the cheapest depth must fit under the ceiling, otherwise no
        // run could ever be admitted.
        let floor = self.estimated_cost(Depth::Basic);
        if floor > self.cost_ceiling {
            return Err(AnalysisError::ConfigInvalid(format!(
                "cost_ceiling {:.4} is below the minimum estimated run cost {:.4}",
                self.cost_ceiling, floor
            )));
        }

        let alpha_enabled = self
            .provider_settings(ALPHA_VANTAGE_PROVIDER)
            .is_some_and(|p| p.enabled);
        if alpha_enabled && self.alpha_vantage_api_key.is_none() {
            return Err(AnalysisError::ConfigInvalid(
                "Alpha Vantage API key required when the alpha_vantage provider is enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    model: Option<String>,
    financial_metrics: Option<StageSettings>,
    industry_comparison: Option<StageSettings>,
    valuation: Option<StageSettings>,
    integration: Option<StageSettings>,
    providers: Option<Vec<ProviderSettings>>,
    cost_ceiling: Option<f64>,
    cost_per_1k_tokens: Option<f64>,
    cache_enabled: Option<bool>,
    cache_ttl_statements: Option<Duration>,
    cache_ttl_profile: Option<Duration>,
    cache_ttl_prices: Option<Duration>,
    alpha_vantage_api_key: Option<String>,
}

impl AnalysisConfigBuilder {
    /// Set the generation model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override settings for one stage
    pub fn stage(mut self, stage: StageName, settings: StageSettings) -> Self {
        match stage {
            StageName::FinancialMetrics => self.financial_metrics = Some(settings),
            StageName::IndustryComparison => self.industry_comparison = Some(settings),
            StageName::ValuationAnalysis => self.valuation = Some(settings),
            StageName::ReportIntegration => self.integration = Some(settings),
        }
        self
    }

    /// Replace the provider slots
    pub fn providers(mut self, providers: Vec<ProviderSettings>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Set the per-run cost ceiling
    pub fn cost_ceiling(mut self, ceiling: f64) -> Self {
        self.cost_ceiling = Some(ceiling);
        self
    }

    /// Set the cost per 1000 generated tokens
    pub fn cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = Some(cost);
        self
    }

    /// Enable or disable the lookaside cache
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Set the cache TTL for financial statements
    pub fn cache_ttl_statements(mut self, ttl: Duration) -> Self {
        self.cache_ttl_statements = Some(ttl);
        self
    }

    /// Set the cache TTL for company profiles
    pub fn cache_ttl_profile(mut self, ttl: Duration) -> Self {
        self.cache_ttl_profile = Some(ttl);
        self
    }

    /// Set the cache TTL for price history
    pub fn cache_ttl_prices(mut self, ttl: Duration) -> Self {
        self.cache_ttl_prices = Some(ttl);
        self
    }

    /// Set the Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Load the Alpha Vantage API key from the environment
    pub fn with_env_api_key(mut self) -> Self {
        if let Ok(key) = std::env::var("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let mut config = AnalysisConfig {
            model: self.model.unwrap_or(defaults.model),
            financial_metrics: self.financial_metrics.unwrap_or(defaults.financial_metrics),
            industry_comparison: self
                .industry_comparison
                .unwrap_or(defaults.industry_comparison),
            valuation: self.valuation.unwrap_or(defaults.valuation),
            integration: self.integration.unwrap_or(defaults.integration),
            providers: self.providers.unwrap_or(defaults.providers),
            cost_ceiling: self.cost_ceiling.unwrap_or(defaults.cost_ceiling),
            cost_per_1k_tokens: self.cost_per_1k_tokens.unwrap_or(defaults.cost_per_1k_tokens),
            cache_enabled: self.cache_enabled.unwrap_or(defaults.cache_enabled),
            cache_ttl_statements: self
                .cache_ttl_statements
                .unwrap_or(defaults.cache_ttl_statements),
            cache_ttl_profile: self.cache_ttl_profile.unwrap_or(defaults.cache_ttl_profile),
            cache_ttl_prices: self.cache_ttl_prices.unwrap_or(defaults.cache_ttl_prices),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
        };

        // A key supplied through the builder switches the slot on
        if config.alpha_vantage_api_key.is_some() {
            for slot in &mut config.providers {
                if slot.name == ALPHA_VANTAGE_PROVIDER {
                    slot.enabled = true;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}
