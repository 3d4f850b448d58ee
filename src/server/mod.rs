//! HTTP server for caselog

mod http;

pub use http::{run, AppState};
