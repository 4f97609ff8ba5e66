mod common;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{capture_logs, respond, NOW, THROTTLED_BODY};
use esiguard::store::keys;
use esiguard::{
    ErrorLimitRecord, LimiterConfig, ManualClock, MemoryStore, ObserverLayer, SharedStore,
    StoreError,
};
use http::Request;
use tower::{Layer, ServiceExt};

fn layer(store: Arc<dyn SharedStore>) -> ObserverLayer {
    ObserverLayer::esi(store, Arc::new(ManualClock::new(NOW)), &LimiterConfig::batch())
}

fn get(uri: &str) -> Request<Bytes> {
    Request::get(uri).body(Bytes::new()).unwrap()
}

#[tokio::test]
async fn error_limit_headers_are_recorded_and_response_is_unaltered() {
    let store = Arc::new(MemoryStore::new());
    let transport = respond(
        200,
        &[("X-Esi-Error-Limit-Remain", "94"), ("X-Esi-Error-Limit-Reset", "41")],
        "[]",
    );

    let response =
        layer(store.clone()).layer(transport).oneshot(get("/latest/alliances/")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-esi-error-limit-remain"], "94");
    assert_eq!(response.body(), &Bytes::from_static(b"[]"));
    assert_eq!(
        ErrorLimitRecord::load(store.as_ref()).await.unwrap(),
        Some(ErrorLimitRecord::new(NOW, 94, 41))
    );
}

#[tokio::test]
async fn each_observer_writes_only_its_own_key() {
    let store = Arc::new(MemoryStore::new());
    let transport = respond(429, &[("Retry-After", "15")], "");
    layer(store.clone()).layer(transport).oneshot(get("/latest/")).await.unwrap();

    assert_eq!(store.get(keys::RATE_LIMITED).await.unwrap(), Some((NOW + 15).to_string()));
    assert_eq!(store.get(keys::THROTTLED).await.unwrap(), None);
    assert_eq!(store.get(keys::ERROR_LIMIT).await.unwrap(), None);

    let transport = respond(500, &[], THROTTLED_BODY);
    let response = layer(store.clone()).layer(transport).oneshot(get("/latest/")).await.unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.body(), &Bytes::from_static(THROTTLED_BODY.as_bytes()));
    assert_eq!(store.get(keys::THROTTLED).await.unwrap(), Some((NOW + 60).to_string()));
    assert_eq!(store.get(keys::RATE_LIMITED).await.unwrap(), Some((NOW + 15).to_string()));
}

#[tokio::test]
async fn deprecation_warning_is_logged_with_uri() {
    let logs = capture_logs();
    let store = Arc::new(MemoryStore::new());
    let transport = respond(200, &[("warning", "299 - This route is deprecated.")], "{}");

    layer(store.clone())
        .layer(transport)
        .oneshot(get("https://esi.evetech.net/v2/characters/1/"))
        .await
        .unwrap();

    let output = logs.contents();
    assert!(output.contains("WARN"), "{output}");
    assert!(output.contains("esiguard::observe"), "{output}");
    assert!(
        output.contains("https://esi.evetech.net/v2/characters/1/: 299 - This route is deprecated."),
        "{output}"
    );
    assert!(store.get(keys::ERROR_LIMIT).await.unwrap().is_none());
}

#[derive(Debug)]
struct Unprovisioned;

#[async_trait]
impl SharedStore for Unprovisioned {
    async fn set(&self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Missing(key.to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn backend(&self) -> &'static str {
        "unprovisioned"
    }
}

#[tokio::test]
async fn missing_state_is_critical_but_response_still_returned() {
    let logs = capture_logs();
    let transport = respond(429, &[], "slow down");

    let response = layer(Arc::new(Unprovisioned))
        .layer(transport)
        .oneshot(get("/latest/"))
        .await
        .unwrap();

    assert_eq!(response.status(), 429);
    assert_eq!(response.body(), &Bytes::from_static(b"slow down"));

    let output = logs.contents();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("severity=\"critical\""), "{output}");
    assert!(output.contains("esi_rate_limited"), "{output}");
}

#[tokio::test]
async fn rejected_writes_are_logged_as_errors() {
    let logs = capture_logs();
    // The error-limit record cannot fit into a 10 byte value.
    let store = Arc::new(MemoryStore::new().with_value_limit(Some(10)));
    let transport = respond(
        200,
        &[("X-Esi-Error-Limit-Remain", "100"), ("X-Esi-Error-Limit-Reset", "60")],
        "",
    );

    let response = layer(store.clone()).layer(transport).oneshot(get("/latest/")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(store.get(keys::ERROR_LIMIT).await.unwrap(), None);
    let output = logs.contents();
    assert!(output.contains("failed to record limiter state"), "{output}");
    assert!(!output.contains("critical"), "{output}");
}
