//! Redis stream message bus
//!
//! Each publish appends one entry to the stream named after the topic:
//! `XADD <topic> * key <key> value <value>`.

use super::bus::{BusError, MessageBus, PublishFuture};
use redis::aio::MultiplexedConnection;
use tracing::info;

impl From<redis::RedisError> for BusError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
            BusError::Unavailable(e.to_string())
        } else if e.is_timeout() {
            BusError::Timeout
        } else {
            BusError::Rejected(e.to_string())
        }
    }
}

/// Bus backed by Redis streams over a multiplexed async connection
#[derive(Clone)]
pub struct RedisStreamBus {
    connection: MultiplexedConnection,
}

impl RedisStreamBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis stream bus at {}", url);
        Ok(RedisStreamBus { connection })
    }
}

impl MessageBus for RedisStreamBus {
    fn publish<'a>(&'a self, topic: &'a str, key: &'a str, value: &'a str) -> PublishFuture<'a> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let _entry_id: String = redis::cmd("XADD")
                .arg(topic)
                .arg("*")
                .arg("key")
                .arg(key)
                .arg("value")
                .arg(value)
                .query_async(&mut connection)
                .await?;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
