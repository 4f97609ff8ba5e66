#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # esiguard
//!
//! Rate-limit coordination for processes that share one EVE ESI budget.
//!
//! Web workers and batch jobs call the same API from separate processes. They
//! coordinate through a [`SharedStore`] (in-process, Redis or SQL) that holds
//! three independent limiter records:
//!
//! - **error limit** from the `X-Esi-Error-Limit-Remain` / `-Reset` headers,
//! - **rate limit** from HTTP 429 and its `Retry-After`,
//! - **throttle** inferred from a malformed 500 body.
//!
//! Responses update the records through [`ObserverLayer`]. Before a call,
//! [`LimiterGate`] reads them fresh and decides whether to proceed. Batch jobs
//! use [`BlockingLimiter`] to sleep until clear; request handlers use
//! [`FailFast`] or [`EsiClient`] to get an [`EsiError`] with the retry epoch.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use esiguard::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), EsiError> {
//! let store: StoreHandle = Arc::new(MemoryStore::new());
//! let clock = Arc::new(SystemClock);
//!
//! // A response reported 9 errors left with 20 seconds to reset.
//! ErrorLimitRecord::new(clock.now(), 9, 20).save(store.as_ref()).await?;
//!
//! let gate = LimiterGate::new(store, clock, LimiterConfig::interactive());
//! let err = FailFast::new(gate).check().await.unwrap_err();
//! assert_eq!(err.kind(), EsiErrorKind::ErrorLimitReached);
//! assert!(err.retry_at().is_some());
//! # Ok(())
//! # }
//! ```

pub mod adaptive;
pub mod client;
pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod gate;
pub mod observe;
pub mod prelude;
pub mod records;
pub mod sleeper;
pub mod store;
#[cfg(feature = "reqwest-transport")]
pub mod transport;

// Re-exports
pub use adaptive::DynamicConfig;
pub use client::{EsiClient, EsiRequest, TokenProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LimiterConfig};
pub use consumer::{BlockingLimiter, FailFast, FailFastError, FailFastLayer, FailFastService};
pub use error::{AuthError, EsiError, EsiErrorKind};
pub use gate::{Decision, GateError, GateReport, LimiterGate, LimiterKind, LimiterStatus};
pub use observe::{
    is_throttle_signature, ObserverLayer, ObserverService, Observation, ResponseObserver,
};
pub use records::{BlockedUntil, ErrorLimitRecord};
pub use sleeper::{ShutdownSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use store::{MemoryStore, SharedStore, StoreError, StoreHandle};
#[cfg(feature = "reqwest-transport")]
pub use transport::{ReqwestTransport, TransportError};
