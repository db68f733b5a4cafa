//! Service layer for the ladder service
//!
//! This module contains the application state, health checks and the HTTP
//! API served to display surfaces.

pub mod api;
pub mod app;
pub mod health;

pub use api::{router, ApiServer};
pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
