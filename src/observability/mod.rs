//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: tracing subscriber setup for the CLI

pub mod logging;
pub mod metrics;
