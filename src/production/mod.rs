mod accept;
mod rollover_manager;
mod server;
mod server_config;

pub use accept::{
    router, AcceptError, AcceptQuery, AcceptRequest, AcceptState, ACCEPT_PATH, FAILED_BODY,
    OK_BODY,
};
pub use rollover_manager::{
    RolloverHandle, RolloverManager, DEFAULT_EXPORT_TIMEOUT, DEFAULT_MAX_TICK,
};
pub use server::{AcceptServer, ServiceError};
pub use server_config::{
    BusKind, ConfigError, ExportConfig, NotifyConfig, ServiceConfig, CONFIG_PATH_VAR,
};
