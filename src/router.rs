//! Front-end router registration surface.
//!
//! The router forwards client connections to workers; the supervisor only
//! registers worker endpoints with it and enumerates what is registered.

use std::net::SocketAddr;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::{AppError, Result};

/// Registration API exposed by the front-end router.
pub trait Router: Send + Sync {
    /// Register `name` at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Router` if the name is already registered at a
    /// different endpoint.
    fn register(&self, name: &str, endpoint: SocketAddr) -> Result<()>;

    /// Remove `name`. Returns whether it was registered.
    fn deregister(&self, name: &str) -> bool;

    /// Every registered worker, ordered by name.
    fn registered(&self) -> Vec<(String, SocketAddr)>;
}

/// In-process registry used when no external router is attached.
#[derive(Debug, Default)]
pub struct LocalRouter {
    servers: DashMap<String, SocketAddr>,
}

impl LocalRouter {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for LocalRouter {
    fn register(&self, name: &str, endpoint: SocketAddr) -> Result<()> {
        match self.servers.entry(name.to_owned()) {
            Entry::Occupied(existing) if *existing.get() == endpoint => Ok(()),
            Entry::Occupied(existing) => Err(AppError::Router(format!(
                "{name} already registered at {}",
                existing.get()
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(endpoint);
                info!(name, %endpoint, "server registered");
                Ok(())
            }
        }
    }

    fn deregister(&self, name: &str) -> bool {
        self.servers.remove(name).is_some()
    }

    fn registered(&self) -> Vec<(String, SocketAddr)> {
        let mut servers: Vec<(String, SocketAddr)> = self
            .servers
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        servers.sort_by(|a, b| a.0.cmp(&b.0));
        servers
    }
}
