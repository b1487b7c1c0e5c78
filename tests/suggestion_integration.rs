//! Integration tests for suggestion orchestration.
//!
//! Providers are scripted in memory: each one sleeps for a configured delay
//! and then answers or fails, counting how often it was called.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use ecocode::{
    AnalysisConfig, AnalysisError, AnalysisSession, Config, FunctionId, Orchestrator, Provider,
    ProviderError, ProviderLedger, ProviderSlot, SuggestionStatus,
};

const SOURCE: &str = "\
def pairs(data):
    out = []
    for i in data:
        for j in data:
            out.append((i, j))
    return out
";

struct ScriptedProvider {
    name: &'static str,
    delay: Duration,
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(name: &'static str, delay: Duration, reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("def pairs(data):"));
        tokio::time::sleep(self.delay).await;
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => Err(ProviderError::Status(500)),
        }
    }
}

const GOOD_REPLY: &str = "\
Building every pair in nested loops is quadratic; a comprehension avoids repeated append lookups.

```python
def pairs(data):
    return [(i, j) for i in data for j in data]
```";

fn session() -> AnalysisSession {
    AnalysisSession::submit(SOURCE, &AnalysisConfig::default()).expect("source should analyze")
}

fn pairs_id() -> FunctionId {
    FunctionId::from("pairs@1")
}

#[tokio::test]
async fn test_primary_success() {
    let primary = ScriptedProvider::new("primary", Duration::ZERO, Some(GOOD_REPLY));
    let secondary = ScriptedProvider::new("secondary", Duration::ZERO, Some("unused"));
    let orchestrator = Orchestrator::new(Duration::from_secs(2))
        .with_provider(ProviderSlot::Primary, primary.clone())
        .with_provider(ProviderSlot::Secondary, secondary.clone());

    let result = session()
        .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Succeeded);
    assert_eq!(result.provider_used, Some(ProviderSlot::Primary));
    assert_eq!(result.function_id, pairs_id());
    assert!(result.rationale_text.starts_with("Building every pair"));
    assert_eq!(
        result.improved_code,
        "def pairs(data):\n    return [(i, j) for i in data for j in data]"
    );
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_primary_timeout_falls_back_to_secondary() {
    let primary = ScriptedProvider::new("slow", Duration::from_secs(5), Some(GOOD_REPLY));
    let secondary = ScriptedProvider::new("fast", Duration::from_millis(10), Some(GOOD_REPLY));
    let orchestrator = Orchestrator::new(Duration::from_millis(100))
        .with_provider(ProviderSlot::Primary, primary.clone())
        .with_provider(ProviderSlot::Secondary, secondary.clone());

    let started = Instant::now();
    let result = session()
        .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Succeeded);
    assert_eq!(result.provider_used, Some(ProviderSlot::Secondary));
    assert_eq!(result.provider_name.as_deref(), Some("fast"));
    assert!(!result.improved_code.is_empty());
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(orchestrator.ledger().stats("slow").failures, 1);
}

#[tokio::test]
async fn test_all_providers_fail() {
    let primary = ScriptedProvider::new("a", Duration::ZERO, None);
    let secondary = ScriptedProvider::new("b", Duration::ZERO, None);
    let orchestrator = Orchestrator::new(Duration::from_secs(1))
        .with_provider(ProviderSlot::Primary, primary.clone())
        .with_provider(ProviderSlot::Secondary, secondary.clone());

    let result = session()
        .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Failed);
    assert_eq!(result.provider_used, None);
    assert!(result.improved_code.is_empty());
    // Exactly one call each, no retries.
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_unknown_function_contacts_no_provider() {
    let primary = ScriptedProvider::new("primary", Duration::ZERO, Some(GOOD_REPLY));
    let orchestrator = Orchestrator::new(Duration::from_secs(1))
        .with_provider(ProviderSlot::Primary, primary.clone());

    let missing = FunctionId::from("missing@1");
    let err = session()
        .suggest(&missing, &orchestrator, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, AnalysisError::NotFound(missing));
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn test_cancel_in_flight_skips_fallback() {
    let primary = ScriptedProvider::new("primary", Duration::from_secs(5), Some(GOOD_REPLY));
    let secondary = ScriptedProvider::new("secondary", Duration::ZERO, Some(GOOD_REPLY));
    let orchestrator = Orchestrator::new(Duration::from_secs(10))
        .with_provider(ProviderSlot::Primary, primary.clone())
        .with_provider(ProviderSlot::Secondary, secondary.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = session()
        .suggest(&pairs_id(), &orchestrator, &cancel)
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Cancelled);
    assert_eq!(result.provider_used, None);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_reply_without_code_block() {
    let primary = ScriptedProvider::new(
        "primary",
        Duration::ZERO,
        Some("Preallocate the output list; the loops themselves are unavoidable."),
    );
    let orchestrator = Orchestrator::new(Duration::from_secs(1))
        .with_provider(ProviderSlot::Primary, primary);

    let result = session()
        .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Succeeded);
    assert!(result.improved_code.is_empty());
    assert_eq!(
        result.rationale_text,
        "Preallocate the output list; the loops themselves are unavoidable."
    );
}

#[tokio::test]
async fn test_shared_ledger_limits_concurrent_sessions() {
    let limited = ScriptedProvider::new("limited", Duration::from_millis(20), Some(GOOD_REPLY));
    let backup = ScriptedProvider::new("backup", Duration::ZERO, Some(GOOD_REPLY));
    let ledger = Arc::new(ProviderLedger::new());
    ledger.set_limit("limited", Some(2));

    let orchestrator = Arc::new(
        Orchestrator::new(Duration::from_secs(1))
            .with_ledger(Arc::clone(&ledger))
            .with_provider(ProviderSlot::Primary, limited.clone())
            .with_provider(ProviderSlot::Secondary, backup.clone()),
    );

    let mut handles = Vec::new();
    for _ in 0..5 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let session = session();
            session
                .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
                .await
                .unwrap()
        }));
    }

    let mut via_backup = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.status, SuggestionStatus::Succeeded);
        if result.provider_used == Some(ProviderSlot::Secondary) {
            via_backup += 1;
        }
    }

    assert_eq!(limited.calls(), 2);
    assert_eq!(via_backup, 3);
    assert_eq!(ledger.stats("limited").throttled, 3);
}

#[tokio::test]
async fn test_unreachable_configured_providers_fail_cleanly() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/providers.yaml");
    let (config, _) = Config::load(Some(&path)).unwrap();
    let orchestrator =
        Orchestrator::from_config(&config.suggestion, Arc::new(ProviderLedger::new())).unwrap();

    let result = session()
        .suggest(&pairs_id(), &orchestrator, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SuggestionStatus::Failed);
    assert_eq!(orchestrator.ledger().stats("unreachable").attempts, 1);
    assert_eq!(orchestrator.ledger().stats("backup").attempts, 1);
}
