//! Multi-source data manager with priority fallback
//!
//! Holds provider slots sorted by configured priority (lower first, ties
//! in registration order) and tries them in order until one returns a
//! non-empty payload. The first success wins; remaining providers are
//! never consulted for that request. Every attempt, successful or not,
//! lands in the returned provenance trail.

use crate::config::AnalysisConfig;
use crate::data::cache::{CacheKey, CacheManager};
use crate::data::provider::DataSourceProvider;
use crate::data::{
    CompanyProfile, Fetched, FinancialDataBundle, Payload, PricePoint, ProviderProvenance,
    RequestKind,
};
use crate::error::{AnalysisError, Result};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// One registered provider with its configuration and connection state
struct ProviderSlot {
    provider: Arc<dyn DataSourceProvider>,
    timeout: Duration,
    /// Probed once at construction; a disconnected provider is recorded
    /// as failed on every request without being invoked
    connected: bool,
    /// Present for providers that are not safe to call concurrently
    serialize: Option<Mutex<()>>,
}

impl ProviderSlot {
    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Priority-ordered fan-out over data source providers
pub struct DataSourceManager {
    slots: Vec<ProviderSlot>,
    cache: Option<CacheManager>,
}

impl DataSourceManager {
    /// Build a manager from registered providers and configuration
    ///
    /// Providers without an enabled configuration slot are dropped here,
    /// so they never appear in provenance. Connection health is probed
    /// once; it is not refreshed per call.
    pub async fn connect(
        providers: Vec<Arc<dyn DataSourceProvider>>,
        config: &AnalysisConfig,
    ) -> Self {
        let mut slots = Vec::new();

        for provider in providers {
            let Some(settings) = config.provider_settings(provider.name()) else {
                debug!(provider = provider.name(), "no configuration slot, dropping");
                continue;
            };
            if !settings.enabled {
                debug!(provider = provider.name(), "disabled, dropping");
                continue;
            }

            let connected = provider.health_check().await;
            if !connected {
                warn!(
                    provider = provider.name(),
                    "health check failed, provider will be reported as failing"
                );
            }

            let serialize = (!provider.reentrant()).then(|| Mutex::new(()));
            slots.push((
                settings.priority,
                ProviderSlot {
                    provider,
                    timeout: settings.timeout,
                    connected,
                    serialize,
                },
            ));
        }

        // Stable sort keeps registration order for equal priorities
        slots.sort_by_key(|(priority, _)| *priority);

        let cache = config.cache_enabled.then(|| {
            CacheManager::new(
                config.cache_ttl_statements,
                config.cache_ttl_profile,
                config.cache_ttl_prices,
            )
        });

        Self {
            slots: slots.into_iter().map(|(_, slot)| slot).collect(),
            cache,
        }
    }

    /// Build the default provider set for a configuration
    ///
    /// Yahoo Finance is always constructed; Alpha Vantage only when an
    /// API key is present. Slots disabled in the configuration are
    /// dropped by [`connect`](Self::connect) regardless.
    pub async fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let mut providers: Vec<Arc<dyn DataSourceProvider>> = Vec::new();

        providers.push(Arc::new(crate::data::yahoo::YahooProvider::new()?));

        if let Some(key) = &config.alpha_vantage_api_key {
            let rate_limit = config
                .provider_settings(crate::config::ALPHA_VANTAGE_PROVIDER)
                .and_then(|s| s.rate_limit_per_minute);
            providers.push(Arc::new(
                crate::data::alpha_vantage::AlphaVantageProvider::new(key.clone(), rate_limit)?,
            ));
        }

        Ok(Self::connect(providers, config).await)
    }

    /// Names of registered providers in fallback order
    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name()).collect()
    }

    /// Fetch financial statements with fallback
    #[instrument(skip(self))]
    pub async fn financial_statements(&self, symbol: &str) -> Result<Fetched<FinancialDataBundle>> {
        let key = CacheKey::new(symbol, RequestKind::FinancialStatements, serde_json::json!({}));
        self.fetch_cached(key, RequestKind::FinancialStatements, symbol, |provider, sym| {
            Box::pin(provider.financial_statements(sym))
        })
        .await
    }

    /// Fetch the company profile with fallback
    #[instrument(skip(self))]
    pub async fn company_info(&self, symbol: &str) -> Result<Fetched<CompanyProfile>> {
        let key = CacheKey::new(symbol, RequestKind::CompanyInfo, serde_json::json!({}));
        self.fetch_cached(key, RequestKind::CompanyInfo, symbol, |provider, sym| {
            Box::pin(provider.company_info(sym))
        })
        .await
    }

    /// Fetch daily price history for the inclusive window with fallback
    #[instrument(skip(self))]
    pub async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Fetched<Vec<PricePoint>>> {
        let key = CacheKey::new(
            symbol,
            RequestKind::PriceHistory,
            serde_json::json!({ "start": start, "end": end }),
        );
        self.fetch_cached(key, RequestKind::PriceHistory, symbol, move |provider, sym| {
            Box::pin(provider.price_history(sym, start, end))
        })
        .await
    }

    /// Drop every cached payload
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear_all().await;
        }
    }

    /// Cache lookaside around the fallback loop
    ///
    /// Hits re-serve the originally recorded result, provenance included.
    async fn fetch_cached<T, F>(
        &self,
        key: CacheKey,
        request: RequestKind,
        symbol: &str,
        fetch: F,
    ) -> Result<Fetched<T>>
    where
        T: Payload + Serialize + DeserializeOwned,
        F: for<'a> Fn(&'a dyn DataSourceProvider, &'a str) -> BoxFuture<'a, Result<T>>,
    {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.for_kind(request).get(&key).await {
                debug!(%request, symbol, "cache hit");
                return Ok(serde_json::from_value(value)?);
            }
        }

        let fetched = self.fetch_first_success(request, symbol, fetch).await?;

        if let Some(cache) = &self.cache {
            let value = serde_json::to_value(&fetched)?;
            cache.for_kind(request).insert(key, value).await;
        }

        Ok(fetched)
    }

    /// Try providers in priority order, returning the first non-empty
    /// payload
    async fn fetch_first_success<T, F>(
        &self,
        request: RequestKind,
        symbol: &str,
        fetch: F,
    ) -> Result<Fetched<T>>
    where
        T: Payload,
        F: for<'a> Fn(&'a dyn DataSourceProvider, &'a str) -> BoxFuture<'a, Result<T>>,
    {
        if self.slots.is_empty() {
            return Err(AnalysisError::NoProvidersConfigured { request });
        }

        let mut attempts: Vec<ProviderProvenance> = Vec::new();
        let mut last_error = String::new();

        for slot in &self.slots {
            if !slot.connected {
                attempts.push(ProviderProvenance::new(slot.name(), request, false));
                last_error = format!("{} is not connected", slot.name());
                continue;
            }

            // Held across the call for providers that cannot overlap
            let _serial = match &slot.serialize {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };

            let outcome = tokio::time::timeout(slot.timeout, fetch(slot.provider.as_ref(), symbol))
                .await
                .unwrap_or_else(|_| {
                    Err(AnalysisError::ProviderApi {
                        provider: slot.name().to_string(),
                        message: format!("request timed out after {}s", slot.timeout.as_secs()),
                    })
                });

            match outcome {
                Ok(payload) if payload.is_empty_payload() => {
                    let err = AnalysisError::EmptyPayload {
                        provider: slot.name().to_string(),
                        request,
                    };
                    warn!(provider = slot.name(), %request, "empty payload, trying next");
                    last_error = err.to_string();
                    attempts.push(ProviderProvenance::new(slot.name(), request, false));
                }
                Ok(payload) => {
                    debug!(provider = slot.name(), %request, symbol, "fetch succeeded");
                    attempts.push(ProviderProvenance::new(slot.name(), request, true));
                    return Ok(Fetched { payload, attempts });
                }
                Err(err) => {
                    warn!(
                        provider = slot.name(),
                        %request,
                        error = %err,
                        "provider failed, trying next"
                    );
                    last_error = err.to_string();
                    attempts.push(ProviderProvenance::new(slot.name(), request, false));
                }
            }
        }

        Err(AnalysisError::AllProvidersFailed {
            request,
            attempts,
            last_error,
        })
    }
}
