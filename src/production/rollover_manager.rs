use crate::counting::{Clock, UniqueCounter, WindowExport, WindowKey};
use crate::export::Exporter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Longest single sleep between boundary checks
pub const DEFAULT_MAX_TICK: Duration = Duration::from_secs(60);
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Closes each minute window and exports its final count
///
/// The only caller of [`UniqueCounter::advance_window`]. The next boundary is
/// recomputed from the clock on every iteration, so a late timer only delays
/// one rollover instead of shifting all later ones.
pub struct RolloverManager {
    counter: Arc<UniqueCounter>,
    exporter: Exporter,
    clock: Arc<dyn Clock>,
    max_tick: Duration,
    export_timeout: Duration,
}

impl RolloverManager {
    pub fn new(counter: Arc<UniqueCounter>, exporter: Exporter, clock: Arc<dyn Clock>) -> Self {
        RolloverManager {
            counter,
            exporter,
            clock,
            max_tick: DEFAULT_MAX_TICK,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }

    pub fn with_max_tick(mut self, max_tick: Duration) -> Self {
        debug_assert!(!max_tick.is_zero(), "max_tick must be positive");
        self.max_tick = max_tick;
        self
    }

    pub fn with_export_timeout(mut self, export_timeout: Duration) -> Self {
        debug_assert!(!export_timeout.is_zero(), "export_timeout must be positive");
        self.export_timeout = export_timeout;
        self
    }

    /// Advance the counter to the clock's current window.
    pub fn tick(&self) -> Option<WindowExport> {
        let export = self.counter.advance_window(self.clock.now_millis())?;

        if export.skipped_windows > 0 {
            warn!(
                "Rollover was {} windows late; windows after {} had no counts",
                export.skipped_windows, export.key
            );
        }
        info!(
            window = export.key.as_u64(),
            "Unique requests in the previous minute: {}", export.count
        );
        Some(export)
    }

    /// `tick`, then hand the closed window to the exporter, bounded by the export timeout.
    pub async fn tick_and_export(&self) -> Option<WindowExport> {
        let export = self.tick()?;
        let publish = self.exporter.publish(export.key, export.count);
        if tokio::time::timeout(self.export_timeout, publish).await.is_err() {
            error!(
                "Export of window {} timed out after {}ms, count {} dropped",
                export.key,
                self.export_timeout.as_millis(),
                export.count
            );
        }
        Some(export)
    }

    fn next_wait(&self) -> Duration {
        let until_boundary = WindowKey::millis_until_next(self.clock.now_millis());
        Duration::from_millis(until_boundary).min(self.max_tick)
    }

    /// Start the rollover loop on the current tokio runtime
    pub fn spawn(self) -> RolloverHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!(
            "Rollover manager started (window {}, topic {})",
            self.counter.current_key(),
            self.exporter.topic()
        );
        let join = tokio::spawn(self.run(shutdown_rx));
        RolloverHandle {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            let wait = self.next_wait();
            debug!("Next rollover check in {}ms", wait.as_millis());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.tick_and_export().await;
                }
                // Fires on an explicit shutdown and when the handle is dropped
                _ = &mut shutdown_rx => break,
            }
        }
        info!("Rollover manager shutting down");
    }
}

/// Handle to a running [`RolloverManager`]. Dropping it also stops the loop.
pub struct RolloverHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RolloverHandle {
    /// Stop the loop and wait for it to exit. The open window is not exported.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Rollover manager ended abnormally: {}", e);
            }
        }
    }
}
