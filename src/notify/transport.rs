//! Notification transport
//!
//! `HttpTransport` POSTs the payload as JSON with reqwest, exactly once per
//! delivery. The client carries a request timeout so a slow callback target
//! cannot pin a notification worker, and does not follow redirects.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Body sent to callback targets: `{"uniqueCount": <integer>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub unique_count: u64,
}

/// Error type for notification delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Connection, DNS, TLS or body encoding failure
    Transport(String),
    /// Target answered with a status outside 2xx/3xx
    Status(u16),
    /// Request did not complete within the client timeout
    Timeout,
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Transport(msg) => write!(f, "Notification transport error: {}", msg),
            NotifyError::Status(code) => write!(f, "Notification target returned status {}", code),
            NotifyError::Timeout => write!(f, "Notification request timed out"),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Transport(e.to_string())
        }
    }
}

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<u16, NotifyError>> + Send + 'a>>;

/// POST capability used by the notifier. Resolves to the response status.
pub trait NotificationTransport: Send + Sync + 'static {
    fn post_json<'a>(
        &'a self,
        target: &'a Url,
        payload: &'a NotificationPayload,
    ) -> DeliveryFuture<'a>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        debug_assert!(!timeout.is_zero(), "Notification timeout must be positive");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpTransport { client })
    }
}

/// 2xx and 3xx count as delivered. Redirects are reported as the 3xx status,
/// never followed.
fn accepted(status: reqwest::StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

impl NotificationTransport for HttpTransport {
    fn post_json<'a>(
        &'a self,
        target: &'a Url,
        payload: &'a NotificationPayload,
    ) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let response = self.client.post(target.clone()).json(payload).send().await?;
            let status = response.status();
            if accepted(status) {
                Ok(status.as_u16())
            } else {
                Err(NotifyError::Status(status.as_u16()))
            }
        })
    }
}
