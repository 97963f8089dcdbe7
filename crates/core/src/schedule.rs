//! Periodic refresh.

use crate::refresh::RefreshCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Runs a refresh every `period`, starting one full period from now.
///
/// Ticks missed while a refresh is still running are skipped. Failed refreshes are logged and
/// simply wait for the next tick.
pub fn spawn_refresh_schedule(
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("scheduled refresh every {}s", period.as_secs());

        loop {
            ticks.tick().await;
            if let Err(e) = coordinator.refresh().await {
                tracing::error!("scheduled refresh failed: {}", e);
            }
        }
    })
}

/// Runs one refresh immediately, logging rather than returning its failure.
pub async fn refresh_now(coordinator: &RefreshCoordinator) {
    if let Err(e) = coordinator.refresh().await {
        tracing::error!("startup refresh failed: {}", e);
    }
}
