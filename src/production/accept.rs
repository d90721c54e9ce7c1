//! Accept endpoint
//!
//! `GET /api/verve/accept?id=<int>&endpoint=<optional url>`
//!
//! Answers `ok` or `failed` as plain text, always with status 200.

use crate::counting::UniqueCounter;
use crate::notify::Notifier;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

pub const ACCEPT_PATH: &str = "/api/verve/accept";

pub const OK_BODY: &str = "ok";
pub const FAILED_BODY: &str = "failed";

/// Raw query parameters, before validation
#[derive(Debug, Default, Deserialize)]
pub struct AcceptQuery {
    pub id: Option<String>,
    pub endpoint: Option<String>,
}

/// Error type for rejected accept requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptError {
    /// `id` parameter absent
    MissingId,
    /// `id` is not a 64-bit integer
    InvalidId(String),
    /// `endpoint` is present but not an absolute URL
    InvalidEndpoint(String),
    /// Query string could not be decoded
    MalformedQuery(String),
}

impl std::fmt::Display for AcceptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptError::MissingId => write!(f, "missing id parameter"),
            AcceptError::InvalidId(raw) => write!(f, "invalid id '{}'", raw),
            AcceptError::InvalidEndpoint(raw) => write!(f, "invalid endpoint '{}'", raw),
            AcceptError::MalformedQuery(msg) => write!(f, "malformed query: {}", msg),
        }
    }
}

impl std::error::Error for AcceptError {}

/// A validated accept request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptRequest {
    pub id: i64,
    pub endpoint: Option<Url>,
}

impl AcceptRequest {
    pub fn parse(query: &AcceptQuery) -> Result<Self, AcceptError> {
        let raw_id = query.id.as_deref().ok_or(AcceptError::MissingId)?;
        let id = raw_id
            .parse::<i64>()
            .map_err(|_| AcceptError::InvalidId(raw_id.to_string()))?;

        let endpoint = match query.endpoint.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                Url::parse(raw).map_err(|_| AcceptError::InvalidEndpoint(raw.to_string()))?,
            ),
        };

        Ok(AcceptRequest { id, endpoint })
    }
}

/// Shared handles for the accept handler
#[derive(Clone)]
pub struct AcceptState {
    counter: Arc<UniqueCounter>,
    notifier: Arc<Notifier>,
}

impl AcceptState {
    pub fn new(counter: Arc<UniqueCounter>, notifier: Arc<Notifier>) -> Self {
        AcceptState { counter, notifier }
    }

    /// Track the id and queue the callback, if any
    pub fn handle(&self, request: AcceptRequest) {
        self.counter.track(request.id);
        if let Some(endpoint) = request.endpoint {
            self.notifier.schedule(endpoint);
        }
    }
}

pub fn router(state: AcceptState) -> Router {
    Router::new()
        .route(ACCEPT_PATH, get(accept))
        .with_state(state)
}

async fn accept(
    State(state): State<AcceptState>,
    query: Result<Query<AcceptQuery>, QueryRejection>,
) -> &'static str {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let e = AcceptError::MalformedQuery(rejection.body_text());
            error!("Error processing request: {}", e);
            return FAILED_BODY;
        }
    };

    match AcceptRequest::parse(&query) {
        Ok(request) => {
            state.handle(request);
            OK_BODY
        }
        Err(e) => {
            error!(
                "Error processing request with id: {}: {}",
                query.id.as_deref().unwrap_or("<none>"),
                e
            );
            FAILED_BODY
        }
    }
}
