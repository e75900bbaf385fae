//! HTTP trigger and one-shot entry point for the post scoring job.

pub mod auth;
pub mod config;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{build_router, AppState};
