//! Interactive ESI client.
//!
//! [`EsiClient`] refuses calls while a limiter is active, attaches the
//! character's bearer token, and sends the request through the observer chain
//! so that the response updates the shared limiter state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT_LANGUAGE, AUTHORIZATION};
use http::{Method, Request, Response, StatusCode};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

use crate::adaptive::DynamicConfig;
use crate::clock::Clock;
use crate::config::LimiterConfig;
use crate::consumer::FailFast;
use crate::error::{AuthError, EsiError};
use crate::gate::LimiterGate;
use crate::observe::{ObserverLayer, ObserverService};
use crate::store::StoreHandle;

pub const COMPATIBILITY_DATE: &str = "x-compatibility-date";

const DEFAULT_ACCEPT_LANGUAGE: &str = "en";

/// Supplies access tokens for characters.
///
/// An empty token is treated as "no valid token".
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    async fn access_token(&self, character_id: u64) -> Result<String, AuthError>;
}

/// One call to an ESI route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsiRequest {
    method: Method,
    path: String,
    body: Bytes,
    character_id: Option<u64>,
    compatibility_date: Option<String>,
    accept_language: Option<String>,
}

impl EsiRequest {
    /// `path` includes the query string, e.g. `/latest/characters/96061222/?datasource=tranquility`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Bytes::new(),
            character_id: None,
            compatibility_date: None,
            accept_language: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Authenticate as this character.
    pub fn with_character(mut self, character_id: u64) -> Self {
        self.character_id = Some(character_id);
        self
    }

    /// Override the configured compatibility date for this call.
    pub fn with_compatibility_date(mut self, date: impl Into<String>) -> Self {
        self.compatibility_date = Some(date.into());
        self
    }

    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn character_id(&self) -> Option<u64> {
        self.character_id
    }
}

/// Fail-fast client for request handlers.
#[derive(Clone, Debug)]
pub struct EsiClient<T> {
    fail_fast: FailFast,
    transport: ObserverService<T>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl<T> EsiClient<T>
where
    T: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + 'static,
    T::Future: Send + 'static,
    T::Error: fmt::Display + Send + 'static,
{
    /// Wrap `transport` with the standard observer chain.
    pub fn new(
        store: StoreHandle,
        clock: Arc<dyn Clock>,
        config: impl Into<DynamicConfig<LimiterConfig>>,
        transport: T,
    ) -> Self {
        let config = config.into();
        let observers = ObserverLayer::esi(store.clone(), clock.clone(), &config.get());
        Self {
            fail_fast: FailFast::new(LimiterGate::new(store, clock, config)),
            transport: observers.layer(transport),
            tokens: None,
        }
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn gate(&self) -> &LimiterGate {
        self.fail_fast.gate()
    }

    /// Send `request` unless a limiter is active.
    ///
    /// Transport failures are returned as a `500` response whose body is the
    /// error message, so callers handle them like any other ESI error status.
    pub async fn request(&self, request: EsiRequest) -> Result<Response<Bytes>, EsiError> {
        self.fail_fast.check().await?;

        let token = match request.character_id {
            Some(character_id) => Some(self.token_for(character_id).await?),
            None => None,
        };
        let http_request = self.build(request, token.as_deref())?;
        let uri = http_request.uri().clone();

        match self.transport.clone().oneshot(http_request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(
                    target: "esiguard::consumer",
                    %uri,
                    error = %message,
                    "ESI request failed"
                );
                let mut response = Response::new(Bytes::from(message));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Ok(response)
            }
        }
    }

    async fn token_for(&self, character_id: u64) -> Result<String, EsiError> {
        let Some(tokens) = &self.tokens else {
            return Err(EsiError::Unknown("no token provider configured".to_string()));
        };
        let token = tokens.access_token(character_id).await?;
        if token.is_empty() {
            return Err(EsiError::InvalidToken);
        }
        Ok(token)
    }

    fn build(&self, request: EsiRequest, token: Option<&str>) -> Result<Request<Bytes>, EsiError> {
        let config = self.gate().config().get();
        let url = format!("{}{}", config.esi_host.trim_end_matches('/'), request.path);

        let mut builder = Request::builder().method(request.method).uri(url).header(
            ACCEPT_LANGUAGE,
            request.accept_language.as_deref().unwrap_or(DEFAULT_ACCEPT_LANGUAGE),
        );
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(date) = request.compatibility_date.as_deref().or(config.compatibility_date.as_deref())
        {
            builder = builder.header(COMPATIBILITY_DATE, date);
        }
        builder.body(request.body).map_err(|e| EsiError::Unknown(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::sync::Mutex;
    use tower::service_fn;

    #[derive(Debug)]
    struct StaticTokens(&'static str);

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn access_token(&self, _character_id: u64) -> Result<String, AuthError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn builds_headers_and_url() {
        let seen: Arc<Mutex<Option<Request<Bytes>>>> = Arc::default();
        let capture = seen.clone();
        let transport = service_fn(move |req: Request<Bytes>| {
            *capture.lock().unwrap() = Some(req);
            async { Ok::<_, std::io::Error>(Response::new(Bytes::from_static(b"[]"))) }
        });

        let config = LimiterConfig { compatibility_date: Some("2025-08-26".into()), ..LimiterConfig::interactive() };
        let client = EsiClient::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            config,
            transport,
        )
        .with_token_provider(Arc::new(StaticTokens("abc")));

        let response = client
            .request(EsiRequest::get("/latest/characters/96061222/assets/").with_character(96061222))
            .await
            .unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"[]"));

        let req = seen.lock().unwrap().take().unwrap();
        assert_eq!(req.uri(), "https://esi.evetech.net/latest/characters/96061222/assets/");
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer abc");
        assert_eq!(req.headers()[ACCEPT_LANGUAGE], "en");
        assert_eq!(req.headers()[COMPATIBILITY_DATE], "2025-08-26");
    }

    #[tokio::test]
    async fn empty_token_is_invalid() {
        let transport = service_fn(|_req: Request<Bytes>| async {
            Ok::<_, std::io::Error>(Response::new(Bytes::new()))
        });
        let client = EsiClient::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            LimiterConfig::interactive(),
            transport,
        )
        .with_token_provider(Arc::new(StaticTokens("")));

        let err = client.request(EsiRequest::get("/latest/").with_character(1)).await.unwrap_err();
        assert_eq!(err, EsiError::InvalidToken);
    }

    #[test]
    fn request_builder_defaults() {
        let request = EsiRequest::post("/latest/universe/names/", "[1,2]");
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/latest/universe/names/");
        assert_eq!(request.character_id(), None);
        assert_eq!(request.body, Bytes::from_static(b"[1,2]"));
    }
}
