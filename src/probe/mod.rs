//! Worker liveness probing.
//!
//! A probe is one bounded network round trip against a worker endpoint.
//! The caller owns the deadline; implementations only perform the exchange.

pub mod status_ping;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use crate::Result;

pub use status_ping::StatusPing;

/// Data a worker reported in answer to a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Clients currently connected to the worker.
    pub online_players: u32,
    /// Client capacity advertised by the worker.
    pub max_players: Option<u32>,
    /// Worker software version string.
    pub version: Option<String>,
}

/// Issues a liveness probe against a worker endpoint.
pub trait LivenessProbe: Send + Sync {
    /// Perform one status exchange with `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Probe`](crate::AppError::Probe) if the worker
    /// cannot be reached or answers with a malformed response.
    fn probe(
        &self,
        endpoint: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Result<ProbeReport>> + Send + '_>>;
}
