//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing, validation, or credential loading failure.
    Config(String),
    /// Filesystem failure while staging a worker's working directory.
    Provision(String),
    /// Worker start script could not be spawned.
    Launch(String),
    /// Worker session could not be terminated.
    Kill(String),
    /// Liveness probe failed to complete a status exchange.
    Probe(String),
    /// Metrics sink write failure.
    Metrics(String),
    /// Router registration failure.
    Router(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Provision(msg) => write!(f, "provision: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::Kill(msg) => write!(f, "kill: {msg}"),
            Self::Probe(msg) => write!(f, "probe: {msg}"),
            Self::Metrics(msg) => write!(f, "metrics: {msg}"),
            Self::Router(msg) => write!(f, "router: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("invalid credentials document: {err}"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        Self::Metrics(err.to_string())
    }
}
