//! Worker descriptor and derived lifecycle state.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::GlobalConfig;

/// Derived lifecycle state for a worker.
///
/// Never stored; computed from `started` membership and restart guard
/// presence by the health orchestrator.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Provisioned and launched but not yet answered a probe.
    StartingUp,
    /// Answered at least one probe and no restart is in flight.
    Healthy,
    /// A restart guard is live for this worker.
    Restarting,
}

impl WorkerState {
    /// Compute the state from the two liveness collections.
    #[must_use]
    pub fn derive(started: bool, guard_held: bool) -> Self {
        match (started, guard_held) {
            (false, _) => Self::StartingUp,
            (true, false) => Self::Healthy,
            (true, true) => Self::Restarting,
        }
    }
}

/// In-memory descriptor of one supervised worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    index: usize,
    name: String,
    endpoint: SocketAddr,
    working_dir: PathBuf,
}

impl WorkerRecord {
    /// Construct a worker descriptor.
    #[must_use]
    pub fn new(index: usize, name: String, endpoint: SocketAddr, working_dir: PathBuf) -> Self {
        Self {
            index,
            name,
            endpoint,
            working_dir,
        }
    }

    /// Fixed pool index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Registered worker name, also used as the multiplexer session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network endpoint the worker listens on.
    #[must_use]
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Worker's working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Session identifier used to terminate the worker externally.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.name
    }
}

/// Immutable table of every worker in the pool, indexed by position.
#[derive(Debug, Clone)]
pub struct WorkerTable {
    workers: Vec<WorkerRecord>,
}

impl WorkerTable {
    /// Build the table from the static port assignment in `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        let workers = config
            .pool
            .ports
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = format!("{}{index}", config.pool.name_prefix);
                let working_dir = config.paths.servers_root.join(&name);
                WorkerRecord::new(
                    index,
                    name,
                    SocketAddr::new(config.pool.host, *port),
                    working_dir,
                )
            })
            .collect();
        Self { workers }
    }

    /// Build a table from explicit records.
    #[must_use]
    pub fn from_records(workers: Vec<WorkerRecord>) -> Self {
        Self { workers }
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Worker at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WorkerRecord> {
        self.workers.get(index)
    }

    /// Worker registered under `name`, if any.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&WorkerRecord> {
        self.workers.iter().find(|worker| worker.name == name)
    }

    /// Iterate workers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter()
    }
}
