use super::accept::{router, AcceptState, ACCEPT_PATH};
use super::rollover_manager::RolloverManager;
use super::server_config::{BusKind, ConfigError, ExportConfig, ServiceConfig};
use crate::counting::{Clock, SystemClock, UniqueCounter};
use crate::export::{BusError, Exporter, InMemoryBus, LogBus, MessageBus};
use crate::notify::{HttpTransport, Notifier, NotifierConfig, NotifyError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Error type for service startup and shutdown
#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    Io(std::io::Error),
    Bus(BusError),
    Notify(NotifyError),
    /// Requested backend was not compiled in
    Unsupported(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Config(e) => write!(f, "{}", e),
            ServiceError::Io(e) => write!(f, "I/O error: {}", e),
            ServiceError::Bus(e) => write!(f, "{}", e),
            ServiceError::Notify(e) => write!(f, "{}", e),
            ServiceError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ConfigError> for ServiceError {
    fn from(e: ConfigError) -> Self {
        ServiceError::Config(e)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Io(e)
    }
}

impl From<BusError> for ServiceError {
    fn from(e: BusError) -> Self {
        ServiceError::Bus(e)
    }
}

impl From<NotifyError> for ServiceError {
    fn from(e: NotifyError) -> Self {
        ServiceError::Notify(e)
    }
}

pub struct AcceptServer {
    config: ServiceConfig,
}

impl AcceptServer {
    pub fn new(config: ServiceConfig) -> Self {
        AcceptServer { config }
    }

    /// Serve until Ctrl-C, then stop the rollover loop and the notifier
    pub async fn run(self) -> Result<(), ServiceError> {
        self.config.validate()?;
        let config = self.config;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let counter = Arc::new(UniqueCounter::new(clock.now_millis()));

        let bus = build_bus(&config.export).await?;
        info!("Exporting to {} bus, topic {}", bus.name(), config.export.topic);
        let exporter = Exporter::new(bus, config.export.topic.clone());
        let rollover = RolloverManager::new(counter.clone(), exporter, clock)
            .with_export_timeout(config.export.timeout)
            .spawn();

        let transport = Arc::new(HttpTransport::new(config.notify.timeout)?);
        let notifier = Arc::new(Notifier::new(
            counter.clone(),
            transport,
            NotifierConfig {
                debounce: config.notify.debounce,
                workers: config.notify.workers,
            },
        ));

        let app = router(AcceptState::new(counter, notifier.clone()));
        let listener = TcpListener::bind(&config.listen_addr).await?;
        info!("Accepting on http://{}{}", config.listen_addr, ACCEPT_PATH);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        rollover.shutdown().await;
        notifier.shutdown().await;

        served.map_err(|e| {
            error!("HTTP server error: {}", e);
            ServiceError::Io(e)
        })
    }
}

async fn build_bus(config: &ExportConfig) -> Result<Arc<dyn MessageBus>, ServiceError> {
    match config.bus {
        BusKind::Log => Ok(Arc::new(LogBus)),
        BusKind::Memory => Ok(Arc::new(InMemoryBus::new())),
        BusKind::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis-bus")]
async fn connect_redis(config: &ExportConfig) -> Result<Arc<dyn MessageBus>, ServiceError> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| ConfigError::Invalid("redis bus requires VERVE_REDIS_URL".to_string()))?;
    let bus = crate::export::RedisStreamBus::connect(url).await?;
    Ok(Arc::new(bus))
}

#[cfg(not(feature = "redis-bus"))]
async fn connect_redis(_config: &ExportConfig) -> Result<Arc<dyn MessageBus>, ServiceError> {
    Err(ServiceError::Unsupported(
        "redis bus requires the 'redis-bus' feature".to_string(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        // Without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_bus_defaults_to_log() {
        let bus = build_bus(&ExportConfig::default()).await.unwrap();
        assert_eq!(bus.name(), "log");
    }

    #[cfg(not(feature = "redis-bus"))]
    #[tokio::test]
    async fn test_redis_bus_needs_feature() {
        let config = ExportConfig {
            bus: BusKind::Redis,
            redis_url: Some("redis://127.0.0.1/".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_bus(&config).await,
            Err(ServiceError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_binding() {
        let mut config = ServiceConfig::default();
        config.export.topic.clear();
        let result = AcceptServer::new(config).run().await;
        assert!(matches!(result, Err(ServiceError::Config(ConfigError::Invalid(_)))));
    }
}
