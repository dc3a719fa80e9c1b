//! # plauder-observability
//!
//! Observability-Crate fuer Plauder:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured JSON Logging via tracing-subscriber
//! - HTTP-Metriken und Request-Tracing als Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, PlauderMetrics};
pub use middleware::{http_metriken, request_timing_layer};
