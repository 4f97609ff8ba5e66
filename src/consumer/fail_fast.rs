use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower_layer::Layer;
use tower_service::Service;

use crate::error::EsiError;
use crate::gate::{Decision, LimiterGate};

/// Refuses calls while any limiter is active instead of waiting.
#[derive(Debug, Clone)]
pub struct FailFast {
    gate: LimiterGate,
}

impl FailFast {
    pub fn new(gate: LimiterGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &LimiterGate {
        &self.gate
    }

    /// `Ok` when every limiter is clear, otherwise the error for the first
    /// blocked limiter in priority order.
    pub async fn check(&self) -> Result<(), EsiError> {
        let report = self.gate.evaluate().await?;
        for (kind, retry_at) in report.blocked() {
            tracing::info!(
                target: "esiguard::consumer",
                limiter = %kind,
                retry_at,
                "{kind} active, refusing ESI call until {retry_at}"
            );
        }
        match report.decision() {
            Decision::Clear => Ok(()),
            Decision::Blocked { kind, retry_at } => Err(EsiError::limited(kind, retry_at)),
        }
    }
}

/// Error returned by [`FailFastService`].
#[derive(Debug, Clone)]
pub enum FailFastError<E> {
    /// The call was refused before reaching the inner service.
    Limited(EsiError),
    /// The inner service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for FailFastError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(e) => write!(f, "{}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for FailFastError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Limited(e) => Some(e),
            Self::Inner(e) => Some(e),
        }
    }
}

impl<E> FailFastError<E> {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited(_))
    }

    pub fn limited(&self) -> Option<&EsiError> {
        match self {
            Self::Limited(e) => Some(e),
            Self::Inner(_) => None,
        }
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Limited(_) => None,
        }
    }
}

/// Layer that applies [`FailFast`] before every call.
#[derive(Clone, Debug)]
pub struct FailFastLayer {
    fail_fast: Arc<FailFast>,
}

impl FailFastLayer {
    pub fn new(gate: LimiterGate) -> Self {
        Self { fail_fast: Arc::new(FailFast::new(gate)) }
    }
}

impl<S> Layer<S> for FailFastLayer {
    type Service = FailFastService<S>;

    fn layer(&self, service: S) -> Self::Service {
        FailFastService { inner: service, fail_fast: self.fail_fast.clone() }
    }
}

/// Service produced by [`FailFastLayer`].
#[derive(Clone, Debug)]
pub struct FailFastService<S> {
    inner: S,
    fail_fast: Arc<FailFast>,
}

impl<S, Req> Service<Req> for FailFastService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = FailFastError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(FailFastError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let fail_fast = self.fail_fast.clone();
        // The ready service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            fail_fast.check().await.map_err(FailFastError::Limited)?;
            inner.call(req).await.map_err(FailFastError::Inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LimiterConfig;
    use crate::records::ErrorLimitRecord;
    use crate::store::{keys, MemoryStore, SharedStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{service_fn, ServiceExt};

    const NOW: i64 = 1_700_000_000;

    fn gate(store: &Arc<MemoryStore>) -> LimiterGate {
        LimiterGate::new(store.clone(), Arc::new(ManualClock::new(NOW)), LimiterConfig::interactive())
    }

    #[tokio::test]
    async fn first_blocked_limiter_wins() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::THROTTLED, &(NOW + 40).to_string()).await.unwrap();
        ErrorLimitRecord::new(NOW, 1, 20).save(store.as_ref()).await.unwrap();

        let err = FailFast::new(gate(&store)).check().await.unwrap_err();
        assert_eq!(err, EsiError::TemporarilyThrottled { retry_at: NOW + 40 });
    }

    #[tokio::test]
    async fn interactive_threshold_is_higher() {
        let store = Arc::new(MemoryStore::new());
        ErrorLimitRecord::new(NOW, 12, 20).save(store.as_ref()).await.unwrap();

        let err = FailFast::new(gate(&store)).check().await.unwrap_err();
        assert_eq!(err, EsiError::ErrorLimitReached { retry_at: NOW + 20 });
    }

    #[tokio::test]
    async fn blocked_calls_never_reach_inner_service() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::RATE_LIMITED, &(NOW + 10).to_string()).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = FailFastLayer::new(gate(&store)).layer(service_fn(move |_req: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, std::io::Error>("sent") }
        }));

        let err = svc.clone().oneshot(()).await.unwrap_err();
        assert_eq!(err.limited(), Some(&EsiError::RateLimitReached { retry_at: NOW + 10 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.set(keys::RATE_LIMITED, &(NOW - 1).to_string()).await.unwrap();
        assert_eq!(svc.oneshot(()).await.unwrap(), "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
