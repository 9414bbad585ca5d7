//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart upload that runs one outpainting job per request
//! - Static serving of uploads and vertical outputs
//! - Service statistics, health and readiness probes
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
