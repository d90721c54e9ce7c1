//! Window Count Export
//!
//! ```text
//! RolloverManager ──► Exporter ──► MessageBus::publish(topic, window key, count)
//! ```

pub mod bus;
pub mod exporter;
#[cfg(feature = "redis-bus")]
pub mod redis_bus;

pub use bus::{BusError, InMemoryBus, LogBus, MessageBus, PublishFuture, PublishedRecord};
pub use exporter::{Exporter, DEFAULT_TOPIC};
#[cfg(feature = "redis-bus")]
pub use redis_bus::RedisStreamBus;
