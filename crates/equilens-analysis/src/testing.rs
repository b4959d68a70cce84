//! Shared test doubles and fixture data

use crate::data::{
    fields, CompanyProfile, DataSourceProvider, FinancialDataBundle, PeriodRecord, PricePoint,
};
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use equilens_llm::{
    GenerationError, GenerationRequest, GenerationResponse, StopReason, TextGenerator, TokenUsage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Two income periods, one balance period, one cash-flow period
pub(crate) fn sample_bundle() -> FinancialDataBundle {
    FinancialDataBundle {
        balance_sheet: vec![PeriodRecord::new("2023-12-31")
            .with(fields::TOTAL_ASSETS, Some(2_000.0))
            .with(fields::TOTAL_LIABILITIES, Some(800.0))
            .with(fields::SHAREHOLDERS_EQUITY, Some(1_200.0))],
        income_statement: vec![
            PeriodRecord::new("2023-12-31")
                .with(fields::TOTAL_REVENUE, Some(1_100.0))
                .with(fields::COST_OF_REVENUE, Some(660.0))
                .with(fields::NET_INCOME, Some(110.0)),
            PeriodRecord::new("2022-12-31")
                .with(fields::TOTAL_REVENUE, Some(1_000.0))
                .with(fields::COST_OF_REVENUE, Some(600.0))
                .with(fields::NET_INCOME, Some(100.0)),
        ],
        cash_flow: vec![
            PeriodRecord::new("2023-12-31").with(fields::OPERATING_CASH_FLOW, Some(150.0)),
        ],
    }
}

pub(crate) fn sample_profile(symbol: &str) -> CompanyProfile {
    CompanyProfile {
        name: Some("Example Corp".to_string()),
        exchange: Some("NASDAQ".to_string()),
        sector: Some("Technology".to_string()),
        industry: Some("Consumer Electronics".to_string()),
        market_cap: Some(3.0e12),
        shares_outstanding: Some(100.0),
        ..CompanyProfile::new(symbol)
    }
}

/// Ten ascending daily bars inside the window, closing 100 to 118
pub(crate) fn sample_prices(start: NaiveDate, _end: NaiveDate) -> Vec<PricePoint> {
    (0..10)
        .map(|i| {
            let close = 100.0 + 2.0 * i as f64;
            PricePoint {
                date: start + ChronoDuration::days(i),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: 1_000 + i as u64,
            }
        })
        .collect()
}

/// Provider double with canned payloads and per-method failure switches
pub(crate) struct StaticProvider {
    name: String,
    healthy: bool,
    reentrant: bool,
    fail_statements: bool,
    fail_profile: bool,
    fail_prices: bool,
    empty_statements: bool,
    delay: Option<Duration>,
    statement_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    price_calls: AtomicUsize,
    price_window: Mutex<Option<(NaiveDate, NaiveDate)>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
}

impl StaticProvider {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            healthy: true,
            reentrant: true,
            fail_statements: false,
            fail_profile: false,
            fail_prices: false,
            empty_statements: false,
            delay: None,
            statement_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            price_calls: AtomicUsize::new(0),
            price_window: Mutex::new(None),
            events: None,
        }
    }

    pub(crate) fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub(crate) fn non_reentrant(mut self) -> Self {
        self.reentrant = false;
        self
    }

    pub(crate) fn fail_statements(mut self) -> Self {
        self.fail_statements = true;
        self
    }

    pub(crate) fn fail_profile(mut self) -> Self {
        self.fail_profile = true;
        self
    }

    pub(crate) fn fail_prices(mut self) -> Self {
        self.fail_prices = true;
        self
    }

    pub(crate) fn fail_everything(self) -> Self {
        self.fail_statements().fail_profile().fail_prices()
    }

    pub(crate) fn empty_statements(mut self) -> Self {
        self.empty_statements = true;
        self
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Record start/end markers for every fetch into the shared log
    pub(crate) fn with_events(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = Some(events);
        self
    }

    pub(crate) fn statement_calls(&self) -> usize {
        self.statement_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    /// The most recent window requested through `price_history`
    pub(crate) fn price_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        *self.price_window.lock().unwrap()
    }

    fn log(&self, marker: &str, what: &str) {
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("{marker}:{what}"));
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn fail(&self, what: &str) -> AnalysisError {
        AnalysisError::ProviderApi {
            provider: self.name.clone(),
            message: format!("canned {what} failure"),
        }
    }
}

#[async_trait]
impl DataSourceProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn reentrant(&self) -> bool {
        self.reentrant
    }

    async fn financial_statements(&self, _symbol: &str) -> Result<FinancialDataBundle> {
        self.statement_calls.fetch_add(1, Ordering::SeqCst);
        self.log("start", "financial_statements");
        self.pause().await;
        let out = if self.fail_statements {
            Err(self.fail("statements"))
        } else if self.empty_statements {
            Ok(FinancialDataBundle::default())
        } else {
            Ok(sample_bundle())
        };
        self.log("end", "financial_statements");
        out
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.log("start", "company_info");
        self.pause().await;
        let out = if self.fail_profile {
            Err(self.fail("profile"))
        } else {
            Ok(sample_profile(symbol))
        };
        self.log("end", "company_info");
        out
    }

    async fn price_history(
        &self,
        _symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        *self.price_window.lock().unwrap() = Some((start, end));
        self.log("start", "price_history");
        self.pause().await;
        let out = if self.fail_prices {
            Err(self.fail("prices"))
        } else {
            Ok(sample_prices(start, end))
        };
        self.log("end", "price_history");
        out
    }
}

/// Generator double that replays a fixed script of responses
///
/// Each call pops the next scripted text; an exhausted script repeats the
/// last entry. `failing()` builds a double whose every call returns a
/// transport error instead.
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<String>>,
    fail: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn script(responses: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(String::from).collect()),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(text: &str) -> Self {
        Self::script(vec![text])
    }

    pub(crate) fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> equilens_llm::Result<GenerationResponse> {
        self.requests.lock().unwrap().push(request);

        if self.fail {
            return Err(GenerationError::RequestFailed(
                "canned transport failure".to_string(),
            ));
        }

        let text = {
            let mut script = self.script.lock().unwrap();
            match script.len() {
                0 => String::new(),
                1 => script.front().cloned().unwrap_or_default(),
                _ => script.pop_front().unwrap_or_default(),
            }
        };

        Ok(GenerationResponse {
            text,
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 200,
            },
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::builder("m").prompt("p").build()
    }

    #[tokio::test]
    async fn test_scripted_generator_replays_then_repeats() {
        let generator = ScriptedGenerator::script(vec!["one", "two"]);

        let first = generator.generate(request()).await.unwrap();
        let second = generator.generate(request()).await.unwrap();
        let third = generator.generate(request()).await.unwrap();

        assert_eq!(first.text, "one");
        assert_eq!(second.text, "two");
        assert_eq!(third.text, "two");
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_static_provider_switches() {
        let provider = StaticProvider::named("p").fail_statements();

        assert!(provider.financial_statements("AAPL").await.is_err());
        assert!(provider.company_info("AAPL").await.is_ok());
        assert_eq!(provider.statement_calls(), 1);
    }
}
