#![forbid(unsafe_code)]

//! Supervisor for a fixed pool of game-server workers.
//!
//! Stages each worker's directory from templates, launches it, registers it
//! with the front-end router and keeps it alive with periodic liveness
//! probes and automatic restarts.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod router;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
