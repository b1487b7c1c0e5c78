//! Suggestion orchestration.
//!
//! Builds one prompt for a hotspot, tries the configured providers in order
//! and normalizes the first usable answer into a `SuggestionResult`.
//!
//! Per request the orchestrator moves through:
//!
//! ```text
//! Idle -> PromptBuilt -> AwaitingPrimary -> Succeeded
//!                              |
//!                              v
//!                      AwaitingSecondary -> Succeeded | Failed
//! ```
//!
//! Either awaiting state can end in `Cancelled`. There is exactly one call per
//! provider and no retry beyond the single fallback hop. Provider failures
//! never escape; the caller always gets a status-tagged result.

mod http;
mod ledger;
pub mod prompt;
mod provider;
pub mod response;

pub use http::ChatCompletionsProvider;
pub use ledger::{ProviderLedger, ProviderStats};
pub use provider::{Provider, ProviderError, ProviderSlot};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::{FunctionId, FunctionRecord};
use crate::config::SuggestionConfig;
use crate::score::HotspotScore;

/// Outcome of a suggestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionStatus::Succeeded => write!(f, "succeeded"),
            SuggestionStatus::Failed => write!(f, "failed"),
            SuggestionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result returned to the caller. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub function_id: FunctionId,
    pub status: SuggestionStatus,
    pub provider_used: Option<ProviderSlot>,
    /// Configured name of the provider that answered.
    pub provider_name: Option<String>,
    pub rationale_text: String,
    pub improved_code: String,
}

impl SuggestionResult {
    fn without_answer(function_id: FunctionId, status: SuggestionStatus) -> Self {
        Self {
            function_id,
            status,
            provider_used: None,
            provider_name: None,
            rationale_text: String::new(),
            improved_code: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SuggestionStatus::Succeeded
    }
}

/// Request lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    PromptBuilt,
    Awaiting(ProviderSlot),
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Idle => write!(f, "Idle"),
            RequestState::PromptBuilt => write!(f, "PromptBuilt"),
            RequestState::Awaiting(ProviderSlot::Primary) => write!(f, "AwaitingPrimary"),
            RequestState::Awaiting(ProviderSlot::Secondary) => write!(f, "AwaitingSecondary"),
            RequestState::Succeeded => write!(f, "Succeeded"),
            RequestState::Failed => write!(f, "Failed"),
            RequestState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Tracks one request's state for logging.
struct RequestTrace<'a> {
    function_id: &'a FunctionId,
    state: RequestState,
}

impl<'a> RequestTrace<'a> {
    fn new(function_id: &'a FunctionId) -> Self {
        Self {
            function_id,
            state: RequestState::Idle,
        }
    }

    fn enter(&mut self, next: RequestState) {
        debug!(function = %self.function_id, from = %self.state, to = %next, "suggestion state");
        self.state = next;
    }
}

/// Language named in prompts and code fences.
const PROMPT_LANGUAGE: &str = "python";

/// Outcome of one provider attempt.
enum Attempt {
    Answer(String),
    Failed(ProviderError),
    Cancelled,
}

/// Tries providers in a fixed order for each suggestion request.
pub struct Orchestrator {
    providers: Vec<(ProviderSlot, Arc<dyn Provider>)>,
    timeout: Duration,
    ledger: Arc<ProviderLedger>,
}

impl Orchestrator {
    /// Create an orchestrator with no providers and its own ledger.
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            timeout,
            ledger: Arc::new(ProviderLedger::new()),
        }
    }

    /// Install a provider in a slot. Slots are tried in the order they are
    /// first added; installing into an occupied slot replaces its provider.
    pub fn with_provider(mut self, slot: ProviderSlot, provider: Arc<dyn Provider>) -> Self {
        match self.providers.iter_mut().find(|(s, _)| *s == slot) {
            Some(entry) => entry.1 = provider,
            None => self.providers.push((slot, provider)),
        }
        self
    }

    /// Share a process-wide ledger with other orchestrators.
    pub fn with_ledger(mut self, ledger: Arc<ProviderLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Build HTTP providers for every configured slot in `provider_order`.
    pub fn from_config(config: &SuggestionConfig, ledger: Arc<ProviderLedger>) -> anyhow::Result<Self> {
        let mut orchestrator = Self::new(config.timeout()).with_ledger(ledger);

        let mut seen = Vec::with_capacity(config.provider_order.len());
        for &slot in &config.provider_order {
            if seen.contains(&slot) {
                anyhow::bail!("suggestion.provider_order lists {} more than once", slot);
            }
            seen.push(slot);
            let Some(provider_cfg) = config.provider(slot) else {
                warn!(%slot, "provider slot listed in provider_order but not configured");
                continue;
            };
            let provider = ChatCompletionsProvider::new(provider_cfg, config.timeout())
                .map_err(|e| anyhow::anyhow!("failed to create {} provider: {}", slot, e))?;
            orchestrator
                .ledger
                .set_limit(&provider_cfg.name, provider_cfg.max_requests_per_minute);
            orchestrator = orchestrator.with_provider(slot, Arc::new(provider));
        }

        if orchestrator.providers.is_empty() {
            anyhow::bail!("no suggestion providers configured (add suggestion.providers to the config)");
        }

        Ok(orchestrator)
    }

    pub fn ledger(&self) -> &Arc<ProviderLedger> {
        &self.ledger
    }

    /// Slots in the order they will be tried.
    pub fn provider_order(&self) -> Vec<ProviderSlot> {
        self.providers.iter().map(|(slot, _)| *slot).collect()
    }

    /// Ask the providers for an improved version of one hotspot.
    ///
    /// Never fails: provider errors resolve to `Failed`, cancellation to
    /// `Cancelled` (without trying the next provider).
    pub async fn request_suggestion(
        &self,
        record: &FunctionRecord,
        score: &HotspotScore,
        cancel: &CancellationToken,
    ) -> SuggestionResult {
        let mut trace = RequestTrace::new(&record.id);

        let prompt = prompt::build(record, score, PROMPT_LANGUAGE);
        trace.enter(RequestState::PromptBuilt);

        for (slot, provider) in &self.providers {
            if cancel.is_cancelled() {
                trace.enter(RequestState::Cancelled);
                return SuggestionResult::without_answer(record.id.clone(), SuggestionStatus::Cancelled);
            }
            trace.enter(RequestState::Awaiting(*slot));

            match self.attempt(provider.as_ref(), &prompt, cancel).await {
                Attempt::Answer(text) => {
                    self.ledger.record_success(provider.name());
                    let parsed = response::parse(&text);
                    trace.enter(RequestState::Succeeded);
                    info!(
                        function = %record.id,
                        provider = provider.name(),
                        %slot,
                        has_code = !parsed.improved_code.is_empty(),
                        "suggestion received"
                    );
                    return SuggestionResult {
                        function_id: record.id.clone(),
                        status: SuggestionStatus::Succeeded,
                        provider_used: Some(*slot),
                        provider_name: Some(provider.name().to_string()),
                        rationale_text: parsed.rationale_text,
                        improved_code: parsed.improved_code,
                    };
                }
                Attempt::Failed(err) => {
                    warn!(
                        function = %record.id,
                        provider = provider.name(),
                        %slot,
                        error = %err,
                        "provider attempt failed"
                    );
                }
                Attempt::Cancelled => {
                    trace.enter(RequestState::Cancelled);
                    info!(function = %record.id, provider = provider.name(), "suggestion cancelled");
                    return SuggestionResult::without_answer(record.id.clone(), SuggestionStatus::Cancelled);
                }
            }
        }

        trace.enter(RequestState::Failed);
        SuggestionResult::without_answer(record.id.clone(), SuggestionStatus::Failed)
    }

    /// One bounded, cancellable call.
    async fn attempt(&self, provider: &dyn Provider, prompt: &str, cancel: &CancellationToken) -> Attempt {
        if !self.ledger.try_acquire(provider.name()) {
            return Attempt::Failed(ProviderError::RateLimited);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Attempt::Cancelled,
            res = tokio::time::timeout(self.timeout, provider.invoke(prompt)) => res,
        };

        let result = match outcome {
            Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::EmptyResponse),
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(ProviderError::Timeout),
        };

        match result {
            Ok(text) => Attempt::Answer(text),
            Err(err) => {
                self.ledger.record_failure(provider.name());
                Attempt::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::analysis::Span;
    use crate::score::ScoreBreakdown;

    struct FixedProvider {
        name: &'static str,
        reply: Result<&'static str, u16>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn status(name: &'static str, code: u16) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Err(code),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn invoke(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(code) => Err(ProviderError::Status(code)),
            }
        }
    }

    fn hotspot() -> (FunctionRecord, HotspotScore) {
        let record = FunctionRecord {
            id: FunctionId::new("f", 1),
            name: "f".to_string(),
            qualified_name: "f".to_string(),
            span: Span {
                start_byte: 0,
                end_byte: 0,
                start_line: 1,
                start_col: 1,
                end_line: 2,
                end_col: 1,
            },
            loop_depth: 1,
            has_recursion: false,
            growth_ops: 0,
            call_fanout: 0,
            expensive_calls: Vec::new(),
            loop_issues: Vec::new(),
            source: "def f(xs):\n    for x in xs: pass\n".to_string(),
        };
        let breakdown = ScoreBreakdown::for_record(&record);
        let score = HotspotScore {
            function_id: record.id.clone(),
            score: breakdown.total(),
            rank: 1,
            breakdown,
        };
        (record, score)
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = FixedProvider::ok("p", "Faster.\n```python\ndef f(xs): pass\n```");
        let secondary = FixedProvider::ok("s", "unused");
        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_provider(ProviderSlot::Primary, primary.clone())
            .with_provider(ProviderSlot::Secondary, secondary.clone());

        let (record, score) = hotspot();
        let result = orch
            .request_suggestion(&record, &score, &CancellationToken::new())
            .await;

        assert_eq!(result.status, SuggestionStatus::Succeeded);
        assert_eq!(result.provider_used, Some(ProviderSlot::Primary));
        assert_eq!(result.provider_name.as_deref(), Some("p"));
        assert_eq!(result.improved_code, "def f(xs): pass");
        assert_eq!(result.rationale_text, "Faster.");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_on_status_error() {
        let primary = FixedProvider::status("p", 503);
        let secondary = FixedProvider::ok("s", "no code here");
        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_provider(ProviderSlot::Primary, primary.clone())
            .with_provider(ProviderSlot::Secondary, secondary.clone());

        let (record, score) = hotspot();
        let result = orch
            .request_suggestion(&record, &score, &CancellationToken::new())
            .await;

        assert_eq!(result.status, SuggestionStatus::Succeeded);
        assert_eq!(result.provider_used, Some(ProviderSlot::Secondary));
        assert!(result.improved_code.is_empty());
        assert_eq!(result.rationale_text, "no code here");
        assert_eq!(orch.ledger().stats("p").failures, 1);
        assert_eq!(orch.ledger().stats("s").successes, 1);
    }

    #[tokio::test]
    async fn test_blank_answer_counts_as_failure() {
        let primary = FixedProvider::ok("p", "   \n");
        let secondary = FixedProvider::status("s", 500);
        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_provider(ProviderSlot::Primary, primary.clone())
            .with_provider(ProviderSlot::Secondary, secondary.clone());

        let (record, score) = hotspot();
        let result = orch
            .request_suggestion(&record, &score, &CancellationToken::new())
            .await;

        assert_eq!(result.status, SuggestionStatus::Failed);
        assert_eq!(result.provider_used, None);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_provider_is_skipped_without_call() {
        let primary = FixedProvider::ok("p", "primary answer");
        let secondary = FixedProvider::ok("s", "secondary answer");
        let ledger = Arc::new(ProviderLedger::new());
        ledger.set_limit("p", Some(1));
        assert!(ledger.try_acquire("p"));

        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_ledger(ledger)
            .with_provider(ProviderSlot::Primary, primary.clone())
            .with_provider(ProviderSlot::Secondary, secondary.clone());

        let (record, score) = hotspot();
        let result = orch
            .request_suggestion(&record, &score, &CancellationToken::new())
            .await;

        assert_eq!(result.provider_used, Some(ProviderSlot::Secondary));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_contacts_nobody() {
        let primary = FixedProvider::ok("p", "answer");
        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_provider(ProviderSlot::Primary, primary.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (record, score) = hotspot();
        let result = orch.request_suggestion(&record, &score, &cancel).await;

        assert_eq!(result.status, SuggestionStatus::Cancelled);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RequestState::Awaiting(ProviderSlot::Primary).to_string(), "AwaitingPrimary");
        assert_eq!(RequestState::Awaiting(ProviderSlot::Secondary).to_string(), "AwaitingSecondary");
    }

    #[test]
    fn test_from_config_requires_providers() {
        let config = SuggestionConfig::default();
        let err = Orchestrator::from_config(&config, Arc::new(ProviderLedger::new()))
            .err()
            .expect("expected error");
        assert!(err.to_string().contains("no suggestion providers"));
    }

    #[test]
    fn test_from_config_rejects_repeated_slot() {
        let yaml = r#"
provider_order: [primary, primary]
providers:
  primary:
    name: p
    endpoint: "http://127.0.0.1:9/v1/chat/completions"
    model: m
"#;
        let config: SuggestionConfig = serde_yaml::from_str(yaml).unwrap();
        let err = Orchestrator::from_config(&config, Arc::new(ProviderLedger::new()))
            .err()
            .expect("expected error");
        assert!(err.to_string().contains("more than once"));

        // Unconfigured slots count too.
        let config = SuggestionConfig {
            provider_order: vec![ProviderSlot::Secondary, ProviderSlot::Secondary, ProviderSlot::Primary],
            ..config
        };
        assert!(Orchestrator::from_config(&config, Arc::new(ProviderLedger::new())).is_err());
    }

    #[tokio::test]
    async fn test_slot_holds_one_provider() {
        let first = FixedProvider::status("first", 500);
        let second = FixedProvider::status("second", 500);
        let orch = Orchestrator::new(Duration::from_secs(1))
            .with_provider(ProviderSlot::Primary, first.clone())
            .with_provider(ProviderSlot::Primary, second.clone());
        assert_eq!(orch.provider_order(), vec![ProviderSlot::Primary]);

        let (record, score) = hotspot();
        let result = orch
            .request_suggestion(&record, &score, &CancellationToken::new())
            .await;

        assert_eq!(result.status, SuggestionStatus::Failed);
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_respects_order() {
        let yaml = r#"
provider_order: [secondary, primary]
providers:
  primary:
    name: a
    endpoint: "http://127.0.0.1:9/v1/chat/completions"
    model: m
  secondary:
    name: b
    endpoint: "http://127.0.0.1:9/v1/chat/completions"
    model: m
    max_requests_per_minute: 1
"#;
        let config: SuggestionConfig = serde_yaml::from_str(yaml).unwrap();
        let ledger = Arc::new(ProviderLedger::new());
        let orch = Orchestrator::from_config(&config, Arc::clone(&ledger)).unwrap();
        assert_eq!(
            orch.provider_order(),
            vec![ProviderSlot::Secondary, ProviderSlot::Primary]
        );
        assert!(ledger.try_acquire("b"));
        assert!(!ledger.try_acquire("b"));
    }
}
