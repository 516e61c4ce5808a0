//! Observability for the data service
//!
//! Events are emitted with `tracing` macros at the call sites; this module
//! only installs the subscriber.
//!
//! # Usage
//!
//! ```ignore
//! use dataserv::observability::{init_logging, LogFormat};
//!
//! init_logging(LogFormat::Json);
//! tracing::info!(port = 8082, "data server listening");
//! ```

mod logger;

pub use logger::{init_logging, LogFormat, DEFAULT_FILTER};
