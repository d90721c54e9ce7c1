//! Unique-id accept service
//!
//! Counts distinct ids per minute, exports each closed minute to the message
//! bus and posts live counts to optional callback endpoints.
//!
//! Configuration: see `production::server_config` (`VERVE_*` variables).

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use verve_accept::observability::init_logging;
use verve_accept::{AcceptServer, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServiceConfig::from_env()?;
    init_logging(config.log_json);

    tracing::info!(
        "Starting verve-accept on {} (bus={:?}, topic={})",
        config.listen_addr,
        config.export.bus,
        config.export.topic
    );

    AcceptServer::new(config).run().await?;

    Ok(())
}
