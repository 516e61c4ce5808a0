//! dataserv - JSON action endpoint over a single relational table
//!
//! A request names an action (`insert`, `update`, `delete`, `search`,
//! `searchx`) and carries column/value pairs; the engine turns it into one
//! parameter-bound query and answers with a fixed-shape envelope.

pub mod cli;
pub mod config;
pub mod engine;
pub mod http_server;
pub mod observability;
pub mod store;
