//! Process-wide provider usage ledger.
//!
//! Concurrent suggestion requests from different sessions may race for the
//! same provider. All per-provider counters and rate-limit windows live behind
//! this single mutex, shared through `Arc`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Rolling window for `max_requests_per_minute`.
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of one provider's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// Calls actually sent.
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Attempts refused locally by the rate limit.
    pub throttled: u64,
}

#[derive(Debug, Default)]
struct ProviderUsage {
    limit_per_minute: Option<u32>,
    window: VecDeque<Instant>,
    stats: ProviderStats,
}

#[derive(Debug, Default)]
pub struct ProviderLedger {
    providers: Mutex<HashMap<String, ProviderUsage>>,
}

impl ProviderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProviderUsage>> {
        // Counters stay usable even if a holder panicked.
        self.providers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set (or clear) the per-minute call budget for a provider.
    pub fn set_limit(&self, provider: &str, per_minute: Option<u32>) {
        let mut providers = self.lock();
        providers.entry(provider.to_string()).or_default().limit_per_minute = per_minute;
    }

    /// Reserve one call. Returns false when the provider is over budget.
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.try_acquire_at(provider, Instant::now())
    }

    fn try_acquire_at(&self, provider: &str, now: Instant) -> bool {
        let mut providers = self.lock();
        let usage = providers.entry(provider.to_string()).or_default();

        while let Some(front) = usage.window.front() {
            if now.duration_since(*front) >= RATE_WINDOW {
                usage.window.pop_front();
            } else {
                break;
            }
        }

        if let Some(limit) = usage.limit_per_minute {
            if usage.window.len() >= limit as usize {
                usage.stats.throttled += 1;
                return false;
            }
        }

        usage.window.push_back(now);
        usage.stats.attempts += 1;
        true
    }

    pub fn record_success(&self, provider: &str) {
        self.lock().entry(provider.to_string()).or_default().stats.successes += 1;
    }

    pub fn record_failure(&self, provider: &str) {
        self.lock().entry(provider.to_string()).or_default().stats.failures += 1;
    }

    pub fn stats(&self, provider: &str) -> ProviderStats {
        self.lock()
            .get(provider)
            .map(|u| u.stats)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unlimited_provider() {
        let ledger = ProviderLedger::new();
        for _ in 0..100 {
            assert!(ledger.try_acquire("openai"));
        }
        assert_eq!(ledger.stats("openai").attempts, 100);
    }

    #[test]
    fn test_rate_limit_window() {
        let ledger = ProviderLedger::new();
        ledger.set_limit("groq", Some(2));
        let start = Instant::now();

        assert!(ledger.try_acquire_at("groq", start));
        assert!(ledger.try_acquire_at("groq", start + Duration::from_secs(1)));
        assert!(!ledger.try_acquire_at("groq", start + Duration::from_secs(2)));

        // First call has aged out of the window.
        assert!(ledger.try_acquire_at("groq", start + Duration::from_secs(61)));

        let stats = ledger.stats("groq");
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.throttled, 1);
    }

    #[test]
    fn test_outcomes_tracked_per_provider() {
        let ledger = ProviderLedger::new();
        ledger.record_success("a");
        ledger.record_failure("a");
        ledger.record_failure("b");

        assert_eq!(ledger.stats("a").successes, 1);
        assert_eq!(ledger.stats("a").failures, 1);
        assert_eq!(ledger.stats("b").failures, 1);
        assert_eq!(ledger.stats("missing"), ProviderStats::default());
    }

    #[test]
    fn test_shared_across_threads() {
        let ledger = Arc::new(ProviderLedger::new());
        ledger.set_limit("shared", Some(10));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || (0..10).filter(|_| ledger.try_acquire("shared")).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
        assert_eq!(ledger.stats("shared").throttled, 30);
    }
}
