use std::time::Duration;

use donation_engine::broadcast::BroadcastHub;
use log::*;
use tokio::task::JoinHandle;

/// Starts the heartbeat worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, subscribers that have not been heard from within `timeout` are closed and dropped.
pub fn start_heartbeat_worker(hub: BroadcastHub, interval: Duration, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Subscriber heartbeat worker started. Checking every {interval:?} for silences over {timeout:?}");
        loop {
            timer.tick().await;
            trace!("🕰️ Running subscriber heartbeat check on {} connections", hub.len());
            let pruned = hub.prune_stale(timeout);
            if !pruned.is_empty() {
                info!("🕰️ {} silent subscribers disconnected", pruned.len());
                debug!("🕰️ Disconnected subscribers: {}", pruned.join(", "));
            }
        }
    })
}
