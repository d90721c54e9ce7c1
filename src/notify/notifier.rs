//! Debounced callback notifier
//!
//! ```text
//! schedule(url) ──► mpsc ──► dispatcher ──► spawn(deliver)
//!                                              │ sleep until scheduled_at + debounce
//!                                              │ acquire worker permit
//!                                              │ read current_count()
//!                                              └► POST {"uniqueCount": n}
//! ```
//!
//! `schedule` never waits. Each request is delivered at most once and its
//! outcome is only logged.

use super::transport::{NotificationPayload, NotificationTransport};
use crate::counting::UniqueCounter;
use parking_lot::Mutex;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Notifier tuning
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Delay between `schedule` and the delivery attempt
    pub debounce: Duration,
    /// Maximum deliveries in flight at once
    pub workers: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            debounce: DEFAULT_DEBOUNCE,
            workers: default_workers(),
        }
    }
}

/// One worker per available core, like a fixed scheduled pool
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A pending callback. The count is read when it fires, not when queued.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub target: Url,
    pub scheduled_at: Instant,
}

struct DeliveryContext {
    counter: Arc<UniqueCounter>,
    transport: Arc<dyn NotificationTransport>,
    permits: Arc<Semaphore>,
    debounce: Duration,
}

pub struct Notifier {
    tx: mpsc::UnboundedSender<NotificationRequest>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Notifier {
    /// Start the dispatcher. Must be called from within a tokio runtime.
    pub fn new(
        counter: Arc<UniqueCounter>,
        transport: Arc<dyn NotificationTransport>,
        config: NotifierConfig,
    ) -> Self {
        debug_assert!(config.workers > 0, "Notifier needs at least one worker");
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let ctx = Arc::new(DeliveryContext {
            counter,
            transport,
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            debounce: config.debounce,
        });
        let dispatcher = tokio::spawn(dispatch(rx, shutdown_rx, ctx));
        info!(
            "Notifier started (debounce={}ms, workers={})",
            config.debounce.as_millis(),
            config.workers
        );

        Notifier {
            tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a notification to `target`.
    pub fn schedule(&self, target: Url) {
        let request = NotificationRequest {
            target,
            scheduled_at: Instant::now(),
        };
        if let Err(e) = self.tx.send(request) {
            warn!("Notifier stopped, dropping notification to {}", e.0.target);
        }
    }

    /// Stop accepting requests. Deliveries already handed to workers still run.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Notifier dispatcher ended abnormally: {}", e);
            }
        }
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<NotificationRequest>,
    mut shutdown_rx: oneshot::Receiver<()>,
    ctx: Arc<DeliveryContext>,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(request) => {
                    tokio::spawn(deliver(request, ctx.clone()));
                }
                None => break,
            },
            _ = &mut shutdown_rx => break,
        }
    }
    info!("Notifier dispatcher shutting down");
}

async fn deliver(request: NotificationRequest, ctx: Arc<DeliveryContext>) {
    tokio::time::sleep_until(request.scheduled_at + ctx.debounce).await;

    let _permit = match ctx.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return,
    };

    let payload = NotificationPayload {
        unique_count: ctx.counter.current_count(),
    };
    debug!(
        "Notifying {} with unique count {}",
        request.target, payload.unique_count
    );

    match ctx.transport.post_json(&request.target, &payload).await {
        Ok(status) => {
            info!(
                "Notification to endpoint {} returned status: {}",
                request.target, status
            );
        }
        Err(e) => {
            error!("Failed to notify endpoint {}: {}", request.target, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::transport::{DeliveryFuture, NotifyError};

    const T0: u64 = 1_700_000_000_000;

    struct ChannelTransport {
        tx: mpsc::UnboundedSender<(Url, NotificationPayload, Instant)>,
        fail: bool,
    }

    impl NotificationTransport for ChannelTransport {
        fn post_json<'a>(
            &'a self,
            target: &'a Url,
            payload: &'a NotificationPayload,
        ) -> DeliveryFuture<'a> {
            Box::pin(async move {
                let _ = self.tx.send((target.clone(), *payload, Instant::now()));
                if self.fail {
                    Err(NotifyError::Status(500))
                } else {
                    Ok(200)
                }
            })
        }
    }

    fn setup(
        fail: bool,
    ) -> (
        Arc<UniqueCounter>,
        Notifier,
        mpsc::UnboundedReceiver<(Url, NotificationPayload, Instant)>,
    ) {
        let counter = Arc::new(UniqueCounter::new(T0));
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport { tx, fail });
        let notifier = Notifier::new(
            counter.clone(),
            transport,
            NotifierConfig {
                debounce: DEFAULT_DEBOUNCE,
                workers: 2,
            },
        );
        (counter, notifier, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_waits_for_debounce() {
        let (_counter, notifier, mut rx) = setup(false);
        let start = Instant::now();

        notifier.schedule(Url::parse("http://localhost/hook").unwrap());
        let (target, _, fired_at) = rx.recv().await.unwrap();

        assert_eq!(target.as_str(), "http://localhost/hook");
        assert!(fired_at.duration_since(start) >= DEFAULT_DEBOUNCE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_is_read_at_fire_time() {
        let (counter, notifier, mut rx) = setup(false);
        counter.track(1);

        notifier.schedule(Url::parse("http://localhost/hook").unwrap());
        for id in 2..=6 {
            counter.track(id);
        }

        let (_, payload, _) = rx.recv().await.unwrap();
        assert_eq!(payload.unique_count, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_targets_are_not_coalesced() {
        let (_counter, notifier, mut rx) = setup(false);
        let url = Url::parse("http://localhost/hook").unwrap();
        for _ in 0..3 {
            notifier.schedule(url.clone());
        }
        for _ in 0..3 {
            let (target, _, _) = rx.recv().await.unwrap();
            assert_eq!(target, url);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_leaves_counter_alone() {
        let (counter, notifier, mut rx) = setup(true);
        counter.track(9);
        notifier.schedule(Url::parse("http://localhost/hook").unwrap());

        rx.recv().await.unwrap();
        assert_eq!(counter.current_count(), 1);

        // Still able to deliver later requests
        notifier.schedule(Url::parse("http://localhost/other").unwrap());
        let (target, _, _) = rx.recv().await.unwrap();
        assert_eq!(target.as_str(), "http://localhost/other");
    }

    #[tokio::test]
    async fn test_schedule_after_shutdown_is_dropped() {
        let (_counter, notifier, mut rx) = setup(false);
        notifier.shutdown().await;
        notifier.schedule(Url::parse("http://localhost/hook").unwrap());

        let waited = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(
            !matches!(waited, Ok(Some(_))),
            "No delivery expected after shutdown"
        );
    }
}
