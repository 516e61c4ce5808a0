//! Data HTTP Routes
//!
//! `ANY /` hands POST bodies to the engine; every other method is answered
//! with 405 and a Failed envelope. `GET /health` is a liveness check.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;

use crate::engine::dispatcher::log_failure;
use crate::engine::{Engine, EngineError};
use crate::store::Store;

/// Data endpoint state shared across handlers
pub struct DataState<S: Store> {
    pub engine: Arc<Engine<S>>,
    pub query_timeout: Duration,
}

impl<S: Store> DataState<S> {
    pub fn new(engine: Engine<S>, query_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            query_timeout,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Create data routes
pub fn data_routes<S: Store + 'static>(state: Arc<DataState<S>>) -> Router {
    Router::new()
        .route("/", any(data_handler::<S>))
        .with_state(state)
}

/// Health check route
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> impl IntoResponse {
    let response = HealthResponse {
        status: "OK".to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Run one envelope through the engine on the blocking pool, bounded by
/// the configured timeout. An elapsed timeout is reported, not retried;
/// the store call itself is left to finish on its worker.
async fn data_handler<S: Store + 'static>(
    State(state): State<Arc<DataState<S>>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    body: Bytes,
) -> Response {
    match remote {
        Some(ConnectInfo(addr)) => tracing::info!(remote = %addr, "request arrived"),
        None => tracing::info!("request arrived"),
    }

    if method != Method::POST {
        let err = EngineError::MethodNotAllowed;
        log_failure(&err);
        return err.into_response();
    }

    tracing::debug!(body = %String::from_utf8_lossy(&body), "request body");

    let engine = Arc::clone(&state.engine);
    let work = tokio::task::spawn_blocking(move || engine.respond(&body));

    match tokio::time::timeout(state.query_timeout, work).await {
        Ok(Ok((status, envelope))) => (status, envelope).into_response(),
        Ok(Err(join_err)) => {
            let err = EngineError::Internal(join_err.to_string());
            log_failure(&err);
            err.into_response()
        }
        Err(_) => {
            let err = EngineError::Timeout(state.query_timeout.as_millis() as u64);
            log_failure(&err);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "OK".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"status":"OK"}"#);
    }
}
