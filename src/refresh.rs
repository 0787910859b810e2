use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app::AppState;

/// Rebuild the dashboard snapshot every `interval`.
///
/// The tick is unconditional; a failed rebuild is retried on the next one.
pub fn spawn_refresher(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            rebuild(&state).await;
        }
    })
}

/// Build a new snapshot off the async workers and publish it
///
/// Shared by the timer and by write handlers. The build is published only
/// once complete, and only if no newer store revision has been published in
/// the meantime; a failed build leaves the previous snapshot in place.
///
/// # Returns
/// * `bool` - Whether the new snapshot was published
pub async fn rebuild(state: &Arc<AppState>) -> bool {
    let builder = state.clone();
    match tokio::task::spawn_blocking(move || builder.build_view()).await {
        Ok(built) => {
            let revision = built.revision;
            let published = state.publish(built);
            if published {
                log::debug!("dashboard view refreshed at revision {}", revision);
            }
            published
        }
        Err(e) => {
            log::warn!("dashboard refresh failed, keeping previous view: {}", e);
            false
        }
    }
}
