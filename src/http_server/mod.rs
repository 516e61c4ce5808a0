//! # Data HTTP Server Module
//!
//! Serves the action endpoint over HTTP.
//!
//! # Endpoints
//!
//! - `/` - Data endpoint (POST only)
//! - `/health` - Health check

pub mod data_routes;
pub mod server;

pub use data_routes::{DataState, HealthResponse};
pub use server::DataServer;
