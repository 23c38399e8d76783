//! HTTP server and shared application state

pub mod http;

pub use http::{handle_request, run, AppState};
