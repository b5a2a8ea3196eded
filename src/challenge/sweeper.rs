// Background reaper for stale challenges

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::store::ChallengeStore;

/// Spawn the periodic expiry sweep. The sweep takes the same
/// per-challenge locks as request handlers, so it never races an
/// in-flight verify.
pub fn start_sweeper(store: Arc<dyn ChallengeStore>, interval_seconds: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        // The first tick completes immediately; skip it so sweeps
        // start one full interval after boot
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let reaped = store.sweep_expired(Utc::now()).await;
            if reaped > 0 {
                info!("Cleaned up {} expired challenges", reaped);
            }
        }
    })
}
