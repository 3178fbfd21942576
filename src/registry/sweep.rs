//! Background eviction task

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::ServiceRegistry;

/// Shortest sweep period; `tokio::time::interval` rejects zero
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

/// Spawn the periodic sweep. Runs until the returned handle is aborted.
///
/// Periods below [`MIN_SWEEP_PERIOD`] are clamped to it.
pub fn spawn_sweep_task(registry: Arc<ServiceRegistry>, period: Duration) -> JoinHandle<()> {
    if period < MIN_SWEEP_PERIOD {
        warn!("Sweep period {:?} too short, using {:?}", period, MIN_SWEEP_PERIOD);
    }
    let period = period.max(MIN_SWEEP_PERIOD);
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let swept = registry.sweep();
            if swept.removed_instances > 0 {
                info!(
                    "Sweep: evicted {} instance(s), dropped {} service(s)",
                    swept.removed_instances, swept.removed_services
                );
            }
            let stats = registry.stats();
            debug!(
                "Registry stats: {} instances in {} services",
                stats.instances, stats.services
            );
        }
    });
    info!("Registry sweep task started (every {:?})", period);
    handle
}
