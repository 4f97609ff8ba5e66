//! Convenient re-exports for common esiguard types.
pub use crate::{
    client::{EsiClient, EsiRequest, TokenProvider},
    clock::{Clock, SystemClock},
    config::LimiterConfig,
    consumer::{BlockingLimiter, FailFast, FailFastLayer},
    error::{AuthError, EsiError, EsiErrorKind},
    gate::{Decision, GateError, LimiterGate, LimiterKind, LimiterStatus},
    observe::{ObserverLayer, ResponseObserver},
    records::{BlockedUntil, ErrorLimitRecord},
    store::{keys, MemoryStore, SharedStore, StoreError, StoreHandle},
};
