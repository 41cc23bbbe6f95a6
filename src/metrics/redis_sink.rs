//! Redis-backed metrics sink.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::info;

use super::MetricsSink;
use crate::config::SinkCredentials;
use crate::Result;

/// Writes counter documents with `SET`.
///
/// The connection is opened on first write, so the supervisor starts even
/// when the store is unreachable. The connection manager reconnects on its
/// own after that.
pub struct RedisSink {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl fmt::Debug for RedisSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSink")
            .field("connected", &self.conn.initialized())
            .finish_non_exhaustive()
    }
}

impl RedisSink {
    /// Build a sink for the store described by `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Metrics` if the connection URL is invalid.
    pub fn new(credentials: &SinkCredentials) -> Result<Self> {
        let client = redis::Client::open(connection_url(credentials))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                info!("metrics sink connected");
                Ok::<_, redis::RedisError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

impl MetricsSink for RedisSink {
    fn publish<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            conn.set::<_, _, ()>(key, value).await?;
            Ok(())
        })
    }
}

/// Build a `redis://` URL, percent-encoding the password.
#[must_use]
pub fn connection_url(credentials: &SinkCredentials) -> String {
    if credentials.password.is_empty() {
        format!("redis://{}:{}/", credentials.host, credentials.port)
    } else {
        format!(
            "redis://:{}@{}:{}/",
            urlencoding::encode(&credentials.password),
            credentials.host,
            credentials.port
        )
    }
}
