//! Callback notification
//!
//! Fire-and-forget POSTs of the live unique count to caller-supplied URLs.

pub mod notifier;
pub mod transport;

pub use notifier::{
    default_workers, NotificationRequest, Notifier, NotifierConfig, DEFAULT_DEBOUNCE,
};
pub use transport::{
    DeliveryFuture, HttpTransport, NotificationPayload, NotificationTransport, NotifyError,
};
