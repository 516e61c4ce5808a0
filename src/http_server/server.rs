//! # HTTP Server
//!
//! Binds the data endpoint and the health check into one Axum server.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::engine::Engine;
use crate::store::Store;

use super::data_routes::{data_routes, health_routes, DataState};

/// HTTP server for the data endpoint
pub struct DataServer {
    config: ServiceConfig,
    router: Router,
}

impl DataServer {
    /// Create a server over an already opened store
    pub fn new<S: Store + 'static>(config: ServiceConfig, store: Arc<S>) -> Self {
        let engine = Engine::new(config.table.clone(), store);
        let state = Arc::new(DataState::new(engine, config.query_timeout()));
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    fn build_router<S: Store + 'static>(config: &ServiceConfig, state: Arc<DataState<S>>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .merge(data_routes(state))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until ctrl-c
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, table = %self.config.table.name, "data server listening");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("data server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::store::SqliteStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server() -> DataServer {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch("CREATE TABLE users (id INTEGER, username TEXT, email TEXT);")
            .unwrap();
        let config = ServiceConfig::for_table(TableConfig::new("users", &["id", "username", "email"]));
        DataServer::new(config, Arc::new(store))
    }

    async fn call(router: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_server_socket_addr() {
        assert_eq!(server().socket_addr(), "0.0.0.0:8082");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(server().router(), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_get_is_rejected() {
        let (status, body) = call(server().router(), Method::GET, "/", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["status"], "Failed");
    }

    #[tokio::test]
    async fn test_post_insert() {
        let payload = json!({"action": "insert", "body": {"id": 1, "username": "ada"}});
        let (status, body) =
            call(server().router(), Method::POST, "/", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK", "response": "null", "error": "null"}));
    }
}
