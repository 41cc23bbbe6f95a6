//! Connected-client counter publication.
//!
//! A background task writes `{"count": n}` under a fixed key on a short
//! period. Writes are fire-and-forget: a failed or slow write is logged
//! and the next tick tries again.

pub mod redis_sink;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::HealthOrchestrator;
use crate::{AppError, Result};

pub use redis_sink::RedisSink;

/// Upper bound on a single sink write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Key-value store the counter document is written to.
pub trait MetricsSink: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Metrics` if the write fails.
    fn publish<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Serialize the counter document for `count` connected clients.
#[must_use]
pub fn count_document(count: u64) -> String {
    serde_json::json!({ "count": count }).to_string()
}

/// Spawn the periodic counter publisher.
///
/// Runs until `cancel` fires. Ticks missed while a write is pending are
/// skipped rather than replayed.
#[must_use]
pub fn spawn_metrics_publisher(
    orchestrator: Arc<HealthOrchestrator>,
    sink: Arc<dyn MetricsSink>,
    key: String,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut failing = false;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("metrics publisher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let document = count_document(orchestrator.connected_clients());
                    let written = tokio::time::timeout(WRITE_TIMEOUT, sink.publish(&key, document))
                        .await
                        .unwrap_or_else(|_| Err(AppError::Metrics("write timed out".into())));

                    match written {
                        Ok(()) if failing => {
                            failing = false;
                            info!(key = %key, "metrics sink writes recovered");
                        }
                        Ok(()) => {}
                        Err(err) if !failing => {
                            failing = true;
                            warn!(key = %key, %err, "metrics sink write failed");
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    })
}
