//! Process-wide rate limiter for the translation provider.
//! One clock shared by every caller: the provider limit is per credential.
//! A caller holds the permit for the whole provider call, so at most one call
//! is in flight and the next one waits on the shared timestamp.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::metrics::{metric_names, MetricsRegistry};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum spacing between provider calls with no recent errors.
    pub base_delay: Duration,
    /// Spacing grows by `backoff_base ^ consecutive_errors`...
    pub backoff_base: u32,
    /// ...capped at this multiplier.
    pub max_multiplier: u32,
    /// Pause after an explicit throttling signal without a Retry-After hint.
    pub rate_limit_cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(4),
            backoff_base: 2,
            max_multiplier: 8,
            rate_limit_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_call: Option<Instant>,
    consecutive_errors: u32,
    cooldown_until: Option<Instant>,
}

pub struct RateLimiter {
    state: Mutex<LimiterState>,
    config: RateLimitConfig,
    metrics: Arc<MetricsRegistry>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            state: Mutex::new(LimiterState::default()),
            config,
            metrics,
        }
    }

    /// `base_delay * min(backoff_base ^ errors, max_multiplier)`.
    pub fn required_delay(&self, consecutive_errors: u32) -> Duration {
        let multiplier = self
            .config
            .backoff_base
            .saturating_pow(consecutive_errors)
            .min(self.config.max_multiplier)
            .max(1);
        self.config.base_delay * multiplier
    }

    /// Wait for the shared clock, then hand out the single call permit.
    pub async fn acquire(&self) -> RateLimitPermit<'_> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut ready = now;
        if let Some(last) = state.last_call {
            ready = ready.max(last + self.required_delay(state.consecutive_errors));
        }
        if let Some(until) = state.cooldown_until {
            ready = ready.max(until);
        }

        if ready > now {
            let wait = ready - now;
            debug!(
                wait_ms = wait.as_millis() as u64,
                consecutive_errors = state.consecutive_errors,
                "rate limit wait"
            );
            tokio::time::sleep_until(ready).await;
            self.metrics
                .record(metric_names::RATE_LIMIT_WAIT, wait.as_micros() as f64);
        }

        state.last_call = Some(Instant::now());
        RateLimitPermit {
            state,
            default_cooldown: self.config.rate_limit_cooldown,
        }
    }

    pub async fn consecutive_errors(&self) -> u32 {
        self.state.lock().await.consecutive_errors
    }
}

/// Exclusive right to one provider call. Dropping it without recording an
/// outcome leaves the error counter untouched (used for invalid output).
pub struct RateLimitPermit<'a> {
    state: MutexGuard<'a, LimiterState>,
    default_cooldown: Duration,
}

impl RateLimitPermit<'_> {
    /// Valid output: backoff resets.
    pub fn record_success(mut self) {
        self.state.consecutive_errors = 0;
        self.state.cooldown_until = None;
    }

    /// Transport or provider error: backoff grows.
    pub fn record_error(mut self) {
        self.state.consecutive_errors = self.state.consecutive_errors.saturating_add(1);
    }

    /// Explicit throttling: backoff grows and every caller pauses for the cooldown.
    pub fn record_rate_limited(mut self, retry_after: Option<Duration>) {
        self.state.consecutive_errors = self.state.consecutive_errors.saturating_add(1);
        let cooldown = retry_after.unwrap_or(self.default_cooldown);
        self.state.cooldown_until = Some(Instant::now() + cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                base_delay: Duration::from_secs(1),
                backoff_base: 2,
                max_multiplier: 8,
                rate_limit_cooldown: Duration::from_secs(30),
            },
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[test]
    fn delay_grows_and_caps() {
        let l = limiter();
        assert_eq!(l.required_delay(0), Duration::from_secs(1));
        assert_eq!(l.required_delay(1), Duration::from_secs(2));
        assert_eq!(l.required_delay(2), Duration::from_secs(4));
        assert_eq!(l.required_delay(3), Duration::from_secs(8));
        assert_eq!(l.required_delay(10), Duration::from_secs(8));
        assert_eq!(l.required_delay(u32::MAX), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate() {
        let l = limiter();
        let start = Instant::now();
        drop(l.acquire().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_spaced() {
        let l = limiter();
        let first = Instant::now();
        l.acquire().await.record_success();
        l.acquire().await.record_success();
        assert!(first.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_stretch_the_spacing() {
        let l = limiter();
        let t0 = Instant::now();
        l.acquire().await.record_error();
        let t1 = Instant::now();
        l.acquire().await.record_error();
        let t2 = Instant::now();
        l.acquire().await.record_success();
        let t3 = Instant::now();

        assert_eq!(t1 - t0, Duration::ZERO);
        assert!(t2 - t1 >= Duration::from_secs(2));
        assert!(t3 - t2 > t2 - t1);
        assert_eq!(l.consecutive_errors().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_output_keeps_error_count() {
        let l = limiter();
        l.acquire().await.record_error();
        drop(l.acquire().await);
        assert_eq!(l.consecutive_errors().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_imposes_cooldown() {
        let l = limiter();
        l.acquire().await.record_rate_limited(None);
        let t = Instant::now();
        l.acquire().await.record_success();
        assert!(t.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_overrides_cooldown() {
        let l = limiter();
        l.acquire().await.record_rate_limited(Some(Duration::from_secs(5)));
        let t = Instant::now();
        l.acquire().await.record_success();
        let waited = t.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(30));
    }
}
