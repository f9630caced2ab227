//! HTTP server for Chainhub

pub mod http;

pub use http::{handle_request, run, serve, AppState};
