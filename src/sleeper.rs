//! Abstraction for the waits taken by the blocking limiter.
//!
//! Production code sleeps on the tokio timer; batch jobs that want to stop
//! promptly on shutdown use [`ShutdownSleeper`]; tests use [`TrackingSleeper`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

/// Abstraction for sleeping/waiting
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Production sleeper using the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Sleeper that wakes early once shutdown is signalled.
///
/// Shutdown is signalled by sending `true` on the paired [`watch::Sender`] or by
/// dropping it. A sleep started after shutdown returns immediately.
#[derive(Debug, Clone)]
pub struct ShutdownSleeper {
    shutdown: watch::Receiver<bool>,
}

impl ShutdownSleeper {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self { shutdown }
    }

    /// Create a sleeper together with the sender used to signal shutdown.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }
}

impl Sleeper for ShutdownSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let mut shutdown = self.shutdown.clone();
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = shutdown_signalled(&mut shutdown) => {
                    tracing::debug!(target: "esiguard::consumer", "sleep interrupted by shutdown");
                }
            }
        })
    }
}

async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Test sleeper that records every requested duration and returns at once.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sum of all recorded sleeps.
    pub fn total(&self) -> Duration {
        self.calls().into_iter().sum()
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(duration);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracking_sleeper_records_and_sums() {
        let sleeper = TrackingSleeper::new();
        sleeper.sleep(Duration::from_secs(5)).await;
        sleeper.sleep(Duration::from_secs(20)).await;
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(5), Duration::from_secs(20)]);
        assert_eq!(sleeper.total(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_full_duration() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_sleeper_wakes_on_signal() {
        let (tx, sleeper) = ShutdownSleeper::channel();
        let start = tokio::time::Instant::now();
        let sleep = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).expect("receiver alive");
        sleep.await.expect("sleep task");
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn shutdown_sleeper_returns_immediately_after_shutdown() {
        let (tx, sleeper) = ShutdownSleeper::channel();
        tx.send(true).expect("receiver alive");
        let start = std::time::Instant::now();
        sleeper.sleep(Duration::from_secs(3600)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
