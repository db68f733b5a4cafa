//! Metrics and monitoring for the ladder service
//!
//! This module provides Prometheus metrics collection for the snapshot cache
//! and the ladder it serves.

pub mod collector;

pub use collector::{CacheMetrics, LadderMetrics, MetricsCollector};
