use esiguard::store::keys;
use esiguard::{ErrorLimitRecord, SharedStore, StoreError};
use esiguard_redis::RedisStore;

// Requires Redis running. If ESIGUARD_TEST_REDIS_URL is unset, the tests skip.
async fn store() -> Option<RedisStore> {
    let url = match std::env::var("ESIGUARD_TEST_REDIS_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("skipping: set ESIGUARD_TEST_REDIS_URL (e.g. redis://127.0.0.1:6379)");
            return None;
        }
    };
    let store = RedisStore::connect(&url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to redis at '{}': {}", url, e));
    let prefix = format!("esiguard-test:{}:", std::process::id());
    Some(store.with_prefix(prefix).with_ttl_secs(60))
}

#[tokio::test]
async fn records_round_trip_through_redis() {
    let Some(store) = store().await else { return };

    let record = ErrorLimitRecord::new(1_700_000_000, 9, 20);
    record.save(&store).await.expect("save");
    assert_eq!(ErrorLimitRecord::load(&store).await.expect("load"), Some(record));

    store.set(keys::RATE_LIMITED, "1700000060").await.expect("set");
    assert_eq!(store.get(keys::RATE_LIMITED).await.expect("get").as_deref(), Some("1700000060"));
    assert_eq!(store.get("never-written").await.expect("get"), None);
}

#[tokio::test]
async fn oversized_entries_are_rejected_before_the_server() {
    let Some(store) = store().await else { return };

    let err = store.set(&"k".repeat(113), "v").await.unwrap_err();
    assert_eq!(err, StoreError::KeyTooLong { len: 113, max: 112 });
    let err = store.set(keys::THROTTLED, &"9".repeat(256)).await.unwrap_err();
    assert_eq!(err, StoreError::ValueTooLong { len: 256, max: 255 });
}
