//! Policies applied on top of the [`LimiterGate`](crate::gate::LimiterGate).
//!
//! - [`BlockingLimiter`] for batch jobs: sleeps until each limiter clears.
//! - [`FailFast`] for interactive callers: returns an [`EsiError`](crate::EsiError)
//!   with the retry epoch and never waits. [`FailFastLayer`] applies the same
//!   check as tower middleware.

pub mod blocking;
pub mod fail_fast;

pub use blocking::BlockingLimiter;
pub use fail_fast::{FailFast, FailFastError, FailFastLayer, FailFastService};
