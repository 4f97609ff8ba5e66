//! A batch job that waits out ESI limits before each call.
//!
//! Run with `ESIGUARD_STORE='{"backend":"sql","url":"sqlite://esiguard.db?mode=rwc"}'`
//! to share state with other processes; defaults to an in-process store.

use std::sync::Arc;
use std::time::Duration;

use esiguard::{LimiterConfig, ShutdownSleeper};
use esiguard_cookbook::{batch_limiter, connect, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(true).init();

    let store_config: StoreConfig = match std::env::var("ESIGUARD_STORE") {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => StoreConfig::default(),
    };
    let store = connect(&store_config).await?;

    let (shutdown, sleeper) = ShutdownSleeper::channel();
    let limiter =
        batch_limiter(store, LimiterConfig::from_env()?).with_sleeper(Arc::new(sleeper));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(true);
        }
    });

    for character_id in [96061222_u64, 2112625428, 91901482] {
        let waited = limiter.check_for_errors().await?;
        println!("character {character_id}: waited {waited}s before calling ESI");
        // The ESI call for this character would go here.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}
