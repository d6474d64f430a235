//! HTTP server

pub mod http;

pub use http::{respond, run, AppState};
