//! Sliding-window rate limiter with burst allowance.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::clock::{Clock, MonotonicClock};
use crate::error::{McpError, RateLimitExceeded, Result};

/// Key used when the caller has no partition of its own.
pub const DEFAULT_KEY: &str = "default";

/// Longest accepted window; reset instants must stay representable.
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Limits applied by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Baseline requests allowed per window
    pub requests: u64,
    /// Length of the rolling window
    pub window: Duration,
    /// Extra admissions allowed once the baseline is used up
    pub burst: Option<u64>,
}

impl RateLimitConfig {
    /// A baseline-only configuration.
    pub fn new(requests: u64, window: Duration) -> Self {
        Self {
            requests,
            window,
            burst: None,
        }
    }

    /// Add a burst allowance on top of the baseline.
    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Burst allowance, with absent treated as zero.
    pub fn burst_allowance(&self) -> u64 {
        self.burst.unwrap_or(0)
    }

    /// Most admissions any window can hold.
    pub fn capacity(&self) -> u64 {
        self.requests.saturating_add(self.burst_allowance())
    }

    /// Reject configurations that could never admit anything.
    pub fn validate(&self) -> Result<()> {
        if self.requests == 0 {
            return Err(McpError::config_key(
                "rate limit requests must be positive",
                "rate_limit_requests",
            ));
        }
        if self.window.is_zero() {
            return Err(McpError::config_key(
                "rate limit window must be positive",
                "rate_limit_window",
            ));
        }
        if self.window > MAX_WINDOW {
            return Err(McpError::config_key(
                format!(
                    "rate limit window must not exceed {} seconds",
                    MAX_WINDOW.as_secs()
                ),
                "rate_limit_window",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Baseline,
    Burst,
}

/// Admission history for a single key.
#[derive(Debug, Default)]
struct KeyState {
    /// Oldest first
    admissions: VecDeque<(Instant, Admission)>,
    /// Burst admissions still inside the window
    burst_used: u64,
}

impl KeyState {
    /// Drop admissions older than `now - window`.
    ///
    /// A pruned burst admission gives its credit back.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, kind)) = self.admissions.front() {
            if now.saturating_duration_since(at) <= window {
                break;
            }
            self.admissions.pop_front();
            if kind == Admission::Burst {
                self.burst_used = self.burst_used.saturating_sub(1);
            }
        }
    }

    fn count(&self) -> u64 {
        self.admissions.len() as u64
    }

    fn oldest(&self) -> Option<Instant> {
        self.admissions.front().map(|&(at, _)| at)
    }

    fn remaining(&self, config: &RateLimitConfig) -> u64 {
        let base = config.requests.saturating_sub(self.count());
        let burst = config.burst_allowance().saturating_sub(self.burst_used);
        base + burst
    }
}

/// A point-in-time view of one key's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Baseline requests per window
    pub limit: u64,
    /// Admissions still available right now, burst included
    pub remaining: u64,
    /// Time until the oldest counted admission leaves the window
    pub reset_after: Duration,
}

/// Per-key sliding-window rate limiter.
///
/// This struct is thread-safe and can be shared across tasks. Each key's
/// prune-decide-record sequence runs under that key's map entry guard, so
/// concurrent callers cannot oversubscribe a key. Distinct keys only contend
/// when they hash to the same shard.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    /// Admission state indexed by caller key
    state: DashMap<String, KeyState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("keys", &self.state.len())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter on the process monotonic clock.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: DashMap::new(),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Try to admit one request for `key`, recording it on success.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.allow_at(key, now)
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut state = self.state.entry(key.to_string()).or_insert_with(|| {
            debug!(
                key = %key,
                requests = self.config.requests,
                window_secs = self.config.window.as_secs_f64(),
                burst = self.config.burst_allowance(),
                "Creating rate limit state"
            );
            KeyState::default()
        });

        state.prune(now, self.config.window);

        if state.count() < self.config.requests {
            state.admissions.push_back((now, Admission::Baseline));
            trace!(key = %key, count = state.count(), "Admitted within baseline quota");
            return true;
        }

        if state.burst_used < self.config.burst_allowance() {
            state.burst_used += 1;
            state.admissions.push_back((now, Admission::Burst));
            debug!(
                key = %key,
                burst_used = state.burst_used,
                "Admitted from burst allowance"
            );
            return true;
        }

        false
    }

    /// Admissions still available for `key`, burst included.
    pub fn remaining(&self, key: &str) -> u64 {
        let now = self.clock.now();
        match self.state.get_mut(key) {
            Some(mut state) => {
                state.prune(now, self.config.window);
                state.remaining(&self.config)
            }
            None => self.config.capacity(),
        }
    }

    /// When the oldest counted admission for `key` leaves the window.
    ///
    /// Returns the current instant if nothing is counted. An admission
    /// exactly `window` old still counts, so a slot frees just after the
    /// returned instant rather than at it.
    pub fn reset_time(&self, key: &str) -> Instant {
        let now = self.clock.now();
        self.reset_time_at(key, now)
    }

    fn reset_time_at(&self, key: &str, now: Instant) -> Instant {
        let Some(mut state) = self.state.get_mut(key) else {
            return now;
        };
        state.prune(now, self.config.window);
        match state.oldest() {
            Some(oldest) => oldest + self.config.window,
            None => now,
        }
    }

    /// Admit one request for `key` or report how long to wait.
    pub fn check(&self, key: &str) -> std::result::Result<(), RateLimitExceeded> {
        let now = self.clock.now();
        if self.allow_at(key, now) {
            return Ok(());
        }

        let retry_after = self
            .reset_time_at(key, now)
            .saturating_duration_since(now)
            .as_secs();

        warn!(
            key = %key,
            limit = self.config.requests,
            retry_after = retry_after,
            "Rate limit exceeded"
        );

        Err(RateLimitExceeded {
            limit: self.config.requests,
            window: self.config.window,
            retry_after,
        })
    }

    /// Remaining quota and reset delay read under one clock sample.
    pub fn status(&self, key: &str) -> RateLimitStatus {
        let now = self.clock.now();
        let (remaining, reset_at) = match self.state.get_mut(key) {
            Some(mut state) => {
                state.prune(now, self.config.window);
                let reset_at = state
                    .oldest()
                    .map(|oldest| oldest + self.config.window)
                    .unwrap_or(now);
                (state.remaining(&self.config), reset_at)
            }
            None => (self.config.capacity(), now),
        };

        RateLimitStatus {
            limit: self.config.requests,
            remaining,
            reset_after: reset_at.saturating_duration_since(now),
        }
    }

    /// Number of keys with state.
    pub fn key_count(&self) -> usize {
        self.state.len()
    }

    /// Forget all keys.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    fn limiter(config: RateLimitConfig) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::with_clock(config, Arc::new(clock.clone())).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_rejects_zero_requests() {
        let err = RateLimiter::new(RateLimitConfig::new(0, Duration::from_secs(1))).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = RateLimiter::new(RateLimitConfig::new(5, Duration::ZERO)).unwrap_err();
        assert!(matches!(
            err,
            McpError::Configuration { config_key: Some(ref k), .. } if k == "rate_limit_window"
        ));
    }

    #[test]
    fn test_rejects_window_too_long_to_represent() {
        let err = RateLimiter::new(RateLimitConfig::new(5, Duration::from_secs(u64::MAX))).unwrap_err();
        assert!(matches!(
            err,
            McpError::Configuration { config_key: Some(ref k), .. } if k == "rate_limit_window"
        ));

        assert!(RateLimiter::new(RateLimitConfig::new(5, MAX_WINDOW)).is_ok());
    }

    #[test]
    fn test_zero_burst_same_as_none() {
        let (with_zero, _) = limiter(RateLimitConfig::new(2, Duration::from_secs(10)).with_burst(0));
        let (without, _) = limiter(RateLimitConfig::new(2, Duration::from_secs(10)));

        let a: Vec<bool> = (0..3).map(|_| with_zero.allow("k")).collect();
        let b: Vec<bool> = (0..3).map(|_| without.allow("k")).collect();
        assert_eq!(a, vec![true, true, false]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_burst_scenario() {
        let (limiter, _) = limiter(RateLimitConfig::new(3, Duration::from_secs(10)).with_burst(1));

        let results: Vec<bool> = (0..4).map(|_| limiter.allow("k")).collect();
        assert_eq!(results, vec![true, true, true, true]);
        assert!(!limiter.allow("k"));
        assert_eq!(limiter.remaining("k"), 0);

        let err = limiter.check("k").unwrap_err();
        assert_eq!(err.limit, 3);
        assert_eq!(err.window, Duration::from_secs(10));
        assert_eq!(err.retry_after, 10);
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = limiter(RateLimitConfig::new(2, Duration::from_secs(10)));

        assert!(limiter.allow("k"));
        clock.advance(Duration::from_secs(4));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        // Only the first admission has aged out.
        clock.advance(Duration::from_secs(7));
        assert_eq!(limiter.remaining("k"), 1);
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_entry_exactly_at_window_edge_still_counts() {
        let (limiter, clock) = limiter(RateLimitConfig::new(1, Duration::from_secs(5)));

        assert!(limiter.allow("k"));
        clock.advance(Duration::from_secs(5));
        assert!(!limiter.allow("k"));
        clock.advance(Duration::from_millis(1));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_recovers_at_reset_time() {
        let (limiter, clock) = limiter(RateLimitConfig::new(2, Duration::from_secs(30)));

        assert!(limiter.allow("k"));
        clock.advance(Duration::from_secs(10));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        let wait = limiter.reset_time("k") - clock.now();
        assert_eq!(wait, Duration::from_secs(20));

        clock.advance(wait + Duration::from_millis(1));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_burst_credit_returns_when_aged_out() {
        let (limiter, clock) = limiter(RateLimitConfig::new(1, Duration::from_secs(10)).with_burst(1));

        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        clock.advance(Duration::from_secs(11));
        assert_eq!(limiter.remaining("k"), 2);
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _) = limiter(RateLimitConfig::new(1, Duration::from_secs(60)));

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.remaining("b"), 0);
        assert_eq!(limiter.key_count(), 2);
    }

    #[test]
    fn test_remaining_decreases_by_one_per_admission() {
        let (limiter, _) = limiter(RateLimitConfig::new(3, Duration::from_secs(60)).with_burst(2));

        let mut before = limiter.remaining(DEFAULT_KEY);
        assert_eq!(before, 5);
        while limiter.allow(DEFAULT_KEY) {
            let after = limiter.remaining(DEFAULT_KEY);
            assert_eq!(after, before - 1);
            before = after;
        }
        assert_eq!(before, 0);
    }

    #[test]
    fn test_remaining_never_negative_after_denials() {
        let (limiter, _) = limiter(RateLimitConfig::new(1, Duration::from_secs(60)));

        for _ in 0..10 {
            limiter.allow("k");
        }
        assert_eq!(limiter.remaining("k"), 0);
    }

    #[test]
    fn test_reads_do_not_create_state() {
        let (limiter, clock) = limiter(RateLimitConfig::new(4, Duration::from_secs(60)).with_burst(1));

        assert_eq!(limiter.remaining("ghost"), 5);
        assert_eq!(limiter.reset_time("ghost"), clock.now());
        assert_eq!(limiter.key_count(), 0);
    }

    #[test]
    fn test_retry_after_rounds_down() {
        let (limiter, clock) = limiter(RateLimitConfig::new(1, Duration::from_secs(10)));

        assert!(limiter.check("k").is_ok());
        clock.advance(Duration::from_millis(2500));

        let err = limiter.check("k").unwrap_err();
        assert_eq!(err.retry_after, 7);
    }

    #[test]
    fn test_status_snapshot() {
        let (limiter, clock) = limiter(RateLimitConfig::new(2, Duration::from_secs(10)).with_burst(1));

        limiter.allow("k");
        clock.advance(Duration::from_secs(3));
        limiter.allow("k");

        let status = limiter.status("k");
        assert_eq!(status.limit, 2);
        assert_eq!(status.remaining, 1);
        assert_eq!(status.reset_after, Duration::from_secs(7));
    }

    #[test]
    fn test_concurrent_callers_never_oversubscribe() {
        let (limiter, _) = limiter(RateLimitConfig::new(50, Duration::from_secs(60)).with_burst(5));

        let admitted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..20).filter(|_| limiter.allow("shared")).count()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 55);
        assert_eq!(limiter.remaining("shared"), 0);
    }

    #[test]
    fn test_clear_counters() {
        let (limiter, _) = limiter(RateLimitConfig::new(1, Duration::from_secs(60)));

        limiter.allow("k");
        assert_eq!(limiter.key_count(), 1);

        limiter.clear();
        assert_eq!(limiter.key_count(), 0);
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_real_clock_window_reset() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, Duration::from_secs(1)).with_burst(0)).unwrap();

        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.allow("k"));
    }
}
