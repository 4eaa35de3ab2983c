//! Background eviction of idle identities.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::clock::ClockSource;
use super::router::EndpointPolicyRouter;

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Spawn a task sweeping every controller of `router` once per `every`.
///
/// Sweeps take the same shard locks as admission checks, so they never race
/// an in-flight decision.
pub fn spawn(
    router: Arc<EndpointPolicyRouter>,
    clock: Arc<dyn ClockSource>,
    every: Duration,
) -> SweeperHandle {
    let (tx, mut rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        info!(interval_ms = every.as_millis() as u64, "Starting identity sweeper");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    let removed = router.sweep(clock.now());
                    debug!(
                        removed = removed,
                        tracked = router.tracked_identities(),
                        "Sweep complete"
                    );
                }
            }
        }

        info!("Identity sweeper stopped");
    });

    SweeperHandle {
        shutdown: Some(tx),
        task,
    }
}
