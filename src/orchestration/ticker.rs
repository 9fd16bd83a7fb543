use super::manager::LifecycleManager;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Drives [`LifecycleManager`] cycles back to back, sleeping `interval` between them.
///
/// A cycle always finishes before the next sleep starts, so cycles never overlap.
pub struct Ticker {
    manager: LifecycleManager,
    interval: Duration,
}

impl Ticker {
    pub fn new(manager: LifecycleManager, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Loop until `shutdown` flips to true or its sender is dropped. Returns the number
    /// of cycles started.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0u64;
        info!(interval_secs = self.interval.as_secs(), "Lifecycle ticker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            cycles += 1;
            if let Err(e) = self.manager.run_cycle().await {
                error!(error = %e, cycle = cycles, "Cycle aborted");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles, "Lifecycle ticker stopped");
        cycles
    }
}
