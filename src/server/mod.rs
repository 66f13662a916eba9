//! HTTP boundary with the orchestrator: feedback in, query results out.

mod http;
pub mod types;

pub use http::HttpServer;
