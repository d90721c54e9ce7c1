//! Message Bus Abstraction
//!
//! The exporter only needs a `publish(topic, key, value)` capability. It is
//! an object-safe async trait so the backing client can be chosen at startup.
//!
//! Implementations:
//! - `InMemoryBus`: records every publish, for tests
//! - `LogBus`: writes each record to the log, for local runs
//! - `RedisStreamBus`: Redis stream entries (feature `redis-bus`)

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Error type for bus publish operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Bus could not be reached
    Unavailable(String),
    /// Bus refused the record
    Rejected(String),
    /// Publish did not finish in time
    Timeout,
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::Unavailable(msg) => write!(f, "Message bus unavailable: {}", msg),
            BusError::Rejected(msg) => write!(f, "Message bus rejected record: {}", msg),
            BusError::Timeout => write!(f, "Message bus publish timed out"),
        }
    }
}

impl std::error::Error for BusError {}

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>>;

/// Publish capability of a message bus
pub trait MessageBus: Send + Sync + 'static {
    /// Send one record. `key` is the partition/ordering key.
    fn publish<'a>(&'a self, topic: &'a str, key: &'a str, value: &'a str) -> PublishFuture<'a>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

// ============================================================================
// InMemoryBus - For tests
// ============================================================================

/// One record accepted by [`InMemoryBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub topic: String,
    pub key: String,
    pub value: String,
}

/// In-memory bus that keeps every published record
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    records: Arc<Mutex<Vec<PublishedRecord>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail with `BusError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all records published so far
    pub fn records(&self) -> Vec<PublishedRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl MessageBus for InMemoryBus {
    fn publish<'a>(&'a self, topic: &'a str, key: &'a str, value: &'a str) -> PublishFuture<'a> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BusError::Unavailable("injected failure".to_string()));
            }
            self.records.lock().push(PublishedRecord {
                topic: topic.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            });
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// LogBus - Default when no real bus is configured
// ============================================================================

/// Bus that only logs records
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBus;

impl MessageBus for LogBus {
    fn publish<'a>(&'a self, topic: &'a str, key: &'a str, value: &'a str) -> PublishFuture<'a> {
        Box::pin(async move {
            info!(topic, key, value, "Published window count");
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
