//! Pure limiter decision over the shared store.
//!
//! The gate reads the three limiter records fresh on every check and reports
//! whether calls may proceed. It never sleeps and never turns a limit into an
//! error; that is left to the consumers in [`crate::consumer`].

use std::fmt;
use std::sync::Arc;

use crate::adaptive::DynamicConfig;
use crate::clock::Clock;
use crate::config::LimiterConfig;
use crate::records::{BlockedUntil, ErrorLimitRecord};
use crate::store::{keys, StoreError, StoreHandle};

/// The three independent limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterKind {
    /// HTTP 429 from the API.
    RateLimit,
    /// Undocumented "temporarily throttled" 500 response.
    Throttle,
    /// Error budget from the `X-Esi-Error-Limit-*` headers.
    ErrorLimit,
}

impl LimiterKind {
    /// Check order; the first blocked limiter in this order wins.
    pub const PRIORITY: [LimiterKind; 3] =
        [LimiterKind::RateLimit, LimiterKind::Throttle, LimiterKind::ErrorLimit];

    /// Storage key holding this limiter's record.
    pub fn key(&self) -> &'static str {
        match self {
            LimiterKind::RateLimit => keys::RATE_LIMITED,
            LimiterKind::Throttle => keys::THROTTLED,
            LimiterKind::ErrorLimit => keys::ERROR_LIMIT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::RateLimit => "rate_limit",
            LimiterKind::Throttle => "throttle",
            LimiterKind::ErrorLimit => "error_limit",
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterStatus {
    Clear,
    /// Calls must wait until this epoch.
    BlockedUntil(i64),
}

impl LimiterStatus {
    pub fn is_clear(&self) -> bool {
        matches!(self, LimiterStatus::Clear)
    }

    pub fn retry_at(&self) -> Option<i64> {
        match self {
            LimiterStatus::Clear => None,
            LimiterStatus::BlockedUntil(at) => Some(*at),
        }
    }
}

/// Overall verdict of an [`GateReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Clear,
    Blocked { kind: LimiterKind, retry_at: i64 },
}

/// Status of every limiter at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    statuses: [(LimiterKind, LimiterStatus); 3],
}

impl GateReport {
    pub fn status(&self, kind: LimiterKind) -> LimiterStatus {
        self.statuses
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(LimiterStatus::Clear, |(_, status)| *status)
    }

    /// The first blocked limiter in priority order, or `Clear`.
    pub fn decision(&self) -> Decision {
        self.statuses
            .iter()
            .find_map(|(kind, status)| {
                status.retry_at().map(|retry_at| Decision::Blocked { kind: *kind, retry_at })
            })
            .unwrap_or(Decision::Clear)
    }

    /// Every blocked limiter, in priority order.
    pub fn blocked(&self) -> Vec<(LimiterKind, i64)> {
        self.statuses
            .iter()
            .filter_map(|(kind, status)| status.retry_at().map(|at| (*kind, at)))
            .collect()
    }

    pub fn is_clear(&self) -> bool {
        self.statuses.iter().all(|(_, status)| status.is_clear())
    }
}

/// Failure to read limiter state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("limiter state unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Error-limit verdict for a record read at `now`.
///
/// Clear when there is no record, when its window already reset, or while the
/// remaining budget is at least `threshold`. Otherwise blocked until the reset,
/// but never for more than `max_wait` seconds.
pub fn error_limit_status(
    record: Option<ErrorLimitRecord>,
    now: i64,
    threshold: i64,
    max_wait: i64,
) -> LimiterStatus {
    let Some(record) = record else {
        return LimiterStatus::Clear;
    };
    if record.is_stale(now) || record.remaining >= threshold {
        return LimiterStatus::Clear;
    }
    let wait = (record.reset_at() - now).min(max_wait);
    if wait <= 0 {
        return LimiterStatus::Clear;
    }
    LimiterStatus::BlockedUntil(now + wait)
}

/// Reads limiter records and decides whether a call may proceed.
#[derive(Debug, Clone)]
pub struct LimiterGate {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: DynamicConfig<LimiterConfig>,
}

impl LimiterGate {
    pub fn new(
        store: StoreHandle,
        clock: Arc<dyn Clock>,
        config: impl Into<DynamicConfig<LimiterConfig>>,
    ) -> Self {
        Self { store, clock, config: config.into() }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Live configuration; updates apply to the next check.
    pub fn config(&self) -> &DynamicConfig<LimiterConfig> {
        &self.config
    }

    /// Check a single limiter against the current time.
    pub async fn check(&self, kind: LimiterKind) -> Result<LimiterStatus, GateError> {
        let store = self.store.as_ref();
        let status = match kind {
            LimiterKind::RateLimit | LimiterKind::Throttle => {
                let now = self.clock.now();
                match BlockedUntil::load(store, kind.key()).await? {
                    Some(until) if until.is_active(now) => LimiterStatus::BlockedUntil(until.0),
                    _ => LimiterStatus::Clear,
                }
            }
            LimiterKind::ErrorLimit => {
                let record = ErrorLimitRecord::load(store).await?;
                let config = self.config.get();
                error_limit_status(
                    record,
                    self.clock.now(),
                    config.error_limit_threshold,
                    config.error_limit_max_wait_secs,
                )
            }
        };
        tracing::trace!(target: "esiguard::gate", limiter = %kind, ?status, "checked");
        Ok(status)
    }

    /// Check all limiters.
    pub async fn evaluate(&self) -> Result<GateReport, GateError> {
        let mut statuses = LimiterKind::PRIORITY.map(|kind| (kind, LimiterStatus::Clear));
        for entry in statuses.iter_mut() {
            entry.1 = self.check(entry.0).await?;
        }
        Ok(GateReport { statuses })
    }
}
