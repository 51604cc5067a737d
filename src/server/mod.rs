//! HTTP server

pub mod cors;
pub mod http;

pub use cors::{CorsDecision, CorsPolicy};
pub use http::{respond, run, AppState};
