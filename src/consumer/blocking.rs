use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::gate::{GateError, LimiterGate, LimiterKind, LimiterStatus};
use crate::sleeper::{Sleeper, TokioSleeper};

/// Waits out every active limiter before a batch job calls the API.
///
/// ```rust
/// use std::sync::Arc;
/// use esiguard::{BlockingLimiter, LimiterConfig, LimiterGate, MemoryStore, SystemClock};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), esiguard::GateError> {
/// let gate = LimiterGate::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(SystemClock),
///     LimiterConfig::batch(),
/// );
/// let limiter = BlockingLimiter::new(gate);
/// let slept = limiter.check_for_errors().await?;
/// assert_eq!(slept, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BlockingLimiter {
    gate: LimiterGate,
    sleeper: Arc<dyn Sleeper>,
    simulate: bool,
    sleep_in_seconds: Arc<Mutex<Option<u64>>>,
}

impl BlockingLimiter {
    pub fn new(gate: LimiterGate) -> Self {
        Self {
            gate,
            sleeper: Arc::new(TokioSleeper),
            simulate: false,
            sleep_in_seconds: Arc::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// When enabled, computed waits are recorded instead of slept.
    pub fn simulate(mut self, enabled: bool) -> Self {
        self.simulate = enabled;
        self
    }

    /// Last wait recorded in simulate mode.
    pub fn sleep_in_seconds(&self) -> Option<u64> {
        *self.sleep_in_seconds.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn gate(&self) -> &LimiterGate {
        &self.gate
    }

    /// Check the rate limit, throttle and error limit in that order, waiting
    /// out each one that is active.
    ///
    /// Every limiter is checked even after an earlier wait. Returns the total
    /// number of seconds waited (or that would have been, when simulating).
    pub async fn check_for_errors(&self) -> Result<u64, GateError> {
        let mut total = 0;
        for kind in LimiterKind::PRIORITY {
            let LimiterStatus::BlockedUntil(retry_at) = self.gate.check(kind).await? else {
                continue;
            };
            let remaining = retry_at - self.gate.clock().now();
            let secs = match kind {
                LimiterKind::RateLimit => {
                    let secs = remaining.max(1) as u64;
                    tracing::info!(
                        target: "esiguard::consumer",
                        limiter = %kind,
                        retry_at,
                        "EsiRateLimited: rate limit hit, sleeping {secs} second(s)."
                    );
                    secs
                }
                LimiterKind::Throttle => {
                    let secs = remaining.max(1) as u64;
                    tracing::info!(
                        target: "esiguard::consumer",
                        limiter = %kind,
                        retry_at,
                        "EsiRateLimited: hit 'throttled', sleeping {secs} seconds"
                    );
                    secs
                }
                LimiterKind::ErrorLimit => {
                    let max_wait = self.gate.config().get().error_limit_max_wait_secs;
                    let secs = remaining.min(max_wait).max(0) as u64;
                    tracing::info!(
                        target: "esiguard::consumer",
                        limiter = %kind,
                        retry_at,
                        "EsiRateLimited: hit error limit, sleeping {secs} seconds"
                    );
                    secs
                }
            };
            self.pause(secs).await;
            total += secs;
        }
        Ok(total)
    }

    async fn pause(&self, secs: u64) {
        if self.simulate {
            *self.sleep_in_seconds.lock().unwrap_or_else(|e| e.into_inner()) = Some(secs);
        } else {
            self.sleeper.sleep(Duration::from_secs(secs)).await;
        }
    }
}
