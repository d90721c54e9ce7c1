use super::bus::MessageBus;
use crate::counting::WindowKey;
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_TOPIC: &str = "verve-unique-counts";

/// Publishes closed-window counts to the message bus
///
/// One send per call. Failures are logged and dropped; a lost export never
/// reaches the caller.
#[derive(Clone)]
pub struct Exporter {
    bus: Arc<dyn MessageBus>,
    topic: String,
}

impl Exporter {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        debug_assert!(!topic.is_empty(), "Export topic cannot be empty");
        Exporter { bus, topic }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `count` for window `key`. Returns whether the send succeeded.
    pub async fn publish(&self, key: WindowKey, count: u64) -> bool {
        let key_str = key.to_string();
        let value = count.to_string();

        match self.bus.publish(&self.topic, &key_str, &value).await {
            Ok(()) => {
                info!(
                    "Sent unique count {} for window {} to {} bus",
                    count,
                    key,
                    self.bus.name()
                );
                true
            }
            Err(e) => {
                error!(
                    "Failed to send unique count {} for window {} to {} bus: {}",
                    count,
                    key,
                    self.bus.name(),
                    e
                );
                false
            }
        }
    }
}
