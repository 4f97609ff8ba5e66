//! Response inspection middleware.
//!
//! [`ObserverLayer`] wraps the transport service. Every response, whatever its
//! status, is handed to each [`ResponseObserver`] once, after it arrives and
//! before it is returned to the caller. Observers record limiter state in the
//! shared store and never alter the response. Transport errors pass through
//! untouched.
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use esiguard::{LimiterConfig, MemoryStore, ObserverLayer, SystemClock};
//! use tower::{service_fn, Layer, ServiceExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let layer = ObserverLayer::esi(store, Arc::new(SystemClock), &LimiterConfig::batch());
//! let transport = service_fn(|_req: http::Request<Bytes>| async {
//!     Ok::<_, std::convert::Infallible>(http::Response::new(Bytes::new()))
//! });
//! let response = layer
//!     .layer(transport)
//!     .oneshot(http::Request::new(Bytes::new()))
//!     .await
//!     .unwrap();
//! assert_eq!(response.status(), 200);
//! # }
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Method, Request, Response, Uri};
use tower_layer::Layer;
use tower_service::Service;

use crate::clock::Clock;
use crate::config::LimiterConfig;
use crate::store::{StoreError, StoreHandle};

mod deprecation;
mod error_limit;
mod rate_limit;
mod throttle;

pub use deprecation::DeprecationObserver;
pub use error_limit::{ErrorLimitObserver, ERROR_LIMIT_REMAIN, ERROR_LIMIT_RESET};
pub use rate_limit::{retry_after_epoch, RateLimitObserver};
pub use throttle::{is_throttle_signature, ThrottleObserver};

/// A completed exchange as seen by observers.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub response: &'a Response<Bytes>,
}

/// Inspects responses and records limiter state.
///
/// Implementations must not fail: storage errors are logged and swallowed so
/// the caller still receives the response.
#[async_trait]
pub trait ResponseObserver: Send + Sync + std::fmt::Debug {
    async fn observe(&self, observation: &Observation<'_>);
}

/// Log a storage failure from inside an observer.
pub(crate) fn report_store_failure(observer: &'static str, key: &str, error: &StoreError) {
    match error {
        StoreError::Missing(_) => tracing::error!(
            target: "esiguard::observe",
            severity = "critical",
            observer,
            key,
            %error,
            "limiter state is not provisioned"
        ),
        _ => tracing::error!(
            target: "esiguard::observe",
            observer,
            key,
            %error,
            "failed to record limiter state"
        ),
    }
}

/// Layer that runs a chain of [`ResponseObserver`]s on every response.
#[derive(Clone, Debug, Default)]
pub struct ObserverLayer {
    observers: Vec<Arc<dyn ResponseObserver>>,
}

impl ObserverLayer {
    /// An empty chain; add observers with [`ObserverLayer::with`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: error limit, rate limit, throttle and deprecation.
    pub fn esi(store: StoreHandle, clock: Arc<dyn Clock>, config: &LimiterConfig) -> Self {
        Self::new()
            .with(ErrorLimitObserver::new(store.clone(), clock.clone()))
            .with(RateLimitObserver::new(
                store.clone(),
                clock.clone(),
                config.default_retry_after_secs,
            ))
            .with(ThrottleObserver::new(store, clock, config.throttle_secs))
            .with(DeprecationObserver)
    }

    pub fn with<O>(mut self, observer: O) -> Self
    where
        O: ResponseObserver + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<S> Layer<S> for ObserverLayer {
    type Service = ObserverService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ObserverService { inner: service, observers: Arc::new(self.observers.clone()) }
    }
}

/// Service produced by [`ObserverLayer`].
#[derive(Clone, Debug)]
pub struct ObserverService<S> {
    inner: S,
    observers: Arc<Vec<Arc<dyn ResponseObserver>>>,
}

impl<S> Service<Request<Bytes>> for ObserverService<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Bytes>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let observers = self.observers.clone();
        let response = self.inner.call(req);

        Box::pin(async move {
            let response = response.await?;
            let observation = Observation { method: &method, uri: &uri, response: &response };
            for observer in observers.iter() {
                observer.observe(&observation).await;
            }
            Ok(response)
        })
    }
}
