//! Periodic worker health checking and automatic restart.
//!
//! Every pass probes each registered worker concurrently. Outcomes are
//! handled independently as they complete:
//!
//! | probe   | started? | guard held? | reaction                         |
//! |---------|----------|-------------|----------------------------------|
//! | failed  | no       | -           | none, still starting up          |
//! | failed  | yes      | yes         | none, restart already in flight  |
//! | failed  | yes      | no          | acquire guard, kill → provision → start ("restarting") |
//! | alive   | no       | -           | mark started ("loaded")          |
//! | alive   | yes      | yes         | release guard ("restarted")      |
//! | alive   | yes      | no          | none                             |
//!
//! The guard is never released on a failed restart; its TTL is the only
//! path back to a fresh attempt.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use super::process::ProcessControl;
use super::provisioner::Provisioner;
use super::restart_guard::RestartGuard;
use crate::models::{WorkerRecord, WorkerState, WorkerTable};
use crate::probe::{LivenessProbe, ProbeReport};
use crate::router::Router;
use crate::{AppError, Result};

/// Result of a single liveness probe after the deadline was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The worker answered within the deadline.
    Alive(ProbeReport),
    /// The exchange failed before the deadline.
    Failed(String),
    /// The deadline elapsed first; any late answer is discarded.
    TimedOut,
}

/// What the orchestrator did in response to one probe outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Failed probe for a worker that never answered; left alone.
    StillStarting,
    /// Failed probe while a restart guard is live; left alone.
    RestartInFlight,
    /// Restart sequence ran to completion.
    RestartIssued,
    /// Restart sequence aborted; the guard stays held until it expires.
    RestartFailed(String),
    /// First successful probe for this worker.
    Loaded,
    /// Successful probe released a live restart guard.
    Recovered,
    /// Successful probe in steady state.
    Healthy,
}

/// External collaborators the orchestrator drives.
pub struct Collaborators {
    /// Stages worker directories.
    pub provisioner: Arc<Provisioner>,
    /// Starts and kills worker processes.
    pub process: Arc<dyn ProcessControl>,
    /// Performs liveness probes.
    pub prober: Arc<dyn LivenessProbe>,
    /// Front-end router workers are registered with.
    pub router: Arc<dyn Router>,
}

/// Owns the worker table and the liveness state derived from probes.
pub struct HealthOrchestrator {
    workers: WorkerTable,
    started: DashSet<usize>,
    guard: RestartGuard,
    online: DashMap<usize, u32>,
    provisioner: Arc<Provisioner>,
    process: Arc<dyn ProcessControl>,
    prober: Arc<dyn LivenessProbe>,
    router: Arc<dyn Router>,
    probe_timeout: Duration,
}

impl std::fmt::Debug for HealthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthOrchestrator")
            .field("workers", &self.workers.len())
            .field("started", &self.started.len())
            .field("guard", &self.guard)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl HealthOrchestrator {
    /// Create an orchestrator for `workers`.
    #[must_use]
    pub fn new(
        workers: WorkerTable,
        collaborators: Collaborators,
        probe_timeout: Duration,
        guard_ttl: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            workers,
            started: DashSet::new(),
            guard: RestartGuard::new(guard_ttl),
            online: DashMap::new(),
            provisioner: collaborators.provisioner,
            process: collaborators.process,
            prober: collaborators.prober,
            router: collaborators.router,
            probe_timeout,
        })
    }

    /// The supervised workers.
    #[must_use]
    pub fn workers(&self) -> &WorkerTable {
        &self.workers
    }

    /// Restart deduplication state.
    #[must_use]
    pub fn restart_guard(&self) -> &RestartGuard {
        &self.guard
    }

    /// Provision, launch and register every worker once.
    ///
    /// A worker whose provisioning or launch fails is logged and left
    /// unregistered; the rest of the pool still starts. Returns the number
    /// of workers registered.
    pub async fn bootstrap(self: &Arc<Self>) -> usize {
        let mut registered = 0;

        for worker in self.workers.iter() {
            let provisioner = Arc::clone(&self.provisioner);
            let process = Arc::clone(&self.process);
            let staged = worker.clone();
            let launched = tokio::task::spawn_blocking(move || {
                provisioner.provision(&staged)?;
                process.start(&staged)
            })
            .await
            .map_err(|err| AppError::Io(format!("bootstrap task panicked: {err}")))
            .and_then(|result| result);

            if let Err(err) = launched {
                error!(worker = worker.name(), %err, "initial launch failed");
                continue;
            }

            match self.router.register(worker.name(), worker.endpoint()) {
                Ok(()) => registered += 1,
                Err(err) => error!(worker = worker.name(), %err, "registration failed"),
            }
        }

        info!(registered, pool = self.workers.len(), "bootstrap complete");
        registered
    }

    /// Start one health-check pass.
    ///
    /// Spawns a detached task per registered worker that probes it and
    /// reacts to the outcome. The returned handles may be awaited or
    /// dropped; dropping them does not cancel the tasks.
    pub fn spawn_health_pass(self: &Arc<Self>) -> Vec<JoinHandle<Reaction>> {
        let expired = self.guard.sweep();
        if expired > 0 {
            debug!(expired, "expired restart guards swept");
        }

        self.router
            .registered()
            .into_iter()
            .filter_map(|(name, endpoint)| {
                let index = self.workers.by_name(&name)?.index();
                let orchestrator = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let outcome = orchestrator.probe_worker(endpoint).await;
                    orchestrator.handle_outcome(index, outcome).await
                }))
            })
            .collect()
    }

    /// Probe `endpoint`, applying the configured deadline.
    pub async fn probe_worker(&self, endpoint: SocketAddr) -> ProbeOutcome {
        match tokio::time::timeout(self.probe_timeout, self.prober.probe(endpoint)).await {
            Ok(Ok(report)) => ProbeOutcome::Alive(report),
            Ok(Err(err)) => ProbeOutcome::Failed(err.to_string()),
            Err(_) => ProbeOutcome::TimedOut,
        }
    }

    /// React to a probe outcome for the worker at `index`.
    pub async fn handle_outcome(self: &Arc<Self>, index: usize, outcome: ProbeOutcome) -> Reaction {
        let Some(worker) = self.workers.get(index) else {
            warn!(index, "probe outcome for unknown worker");
            return Reaction::StillStarting;
        };

        match outcome {
            ProbeOutcome::Alive(report) => {
                self.online.insert(index, report.online_players);
                self.on_alive(worker)
            }
            ProbeOutcome::Failed(reason) => {
                self.online.remove(&index);
                debug!(worker = worker.name(), %reason, "probe failed");
                self.on_unresponsive(worker).await
            }
            ProbeOutcome::TimedOut => {
                self.online.remove(&index);
                debug!(worker = worker.name(), "probe timed out");
                self.on_unresponsive(worker).await
            }
        }
    }

    fn on_alive(&self, worker: &WorkerRecord) -> Reaction {
        let index = worker.index();

        if self.started.insert(index) {
            info!(worker = worker.name(), "loaded");
            return Reaction::Loaded;
        }

        // A guard that expired before recovery is gone here, so that
        // recovery goes unlogged.
        if self.guard.release(index) {
            info!(worker = worker.name(), "restarted");
            return Reaction::Recovered;
        }

        Reaction::Healthy
    }

    async fn on_unresponsive(self: &Arc<Self>, worker: &WorkerRecord) -> Reaction {
        let index = worker.index();

        if !self.started.contains(&index) {
            return Reaction::StillStarting;
        }

        if self.guard.is_held(index) || !self.guard.try_acquire(index) {
            return Reaction::RestartInFlight;
        }

        match self.restart(worker).await {
            Ok(()) => {
                info!(worker = worker.name(), "restarting");
                Reaction::RestartIssued
            }
            Err(err) => {
                error!(
                    worker = worker.name(),
                    %err,
                    "restart aborted; guard held until expiry"
                );
                Reaction::RestartFailed(err.to_string())
            }
        }
    }

    /// Kill, re-provision and start `worker` on the blocking pool.
    ///
    /// Steps are strictly sequential and the first failure aborts.
    async fn restart(&self, worker: &WorkerRecord) -> Result<()> {
        let provisioner = Arc::clone(&self.provisioner);
        let process = Arc::clone(&self.process);
        let worker = worker.clone();

        tokio::task::spawn_blocking(move || {
            let span = info_span!("restart", worker = worker.name());
            let _guard = span.enter();

            process.kill(&worker)?;
            provisioner.provision(&worker)?;
            let handle = process.start(&worker)?;
            debug!(pid = handle.pid.unwrap_or(0), "restart sequence complete");
            Ok(())
        })
        .await
        .map_err(|err| AppError::Io(format!("restart task panicked: {err}")))?
    }

    /// Whether every worker in the pool has answered a probe.
    #[must_use]
    pub fn all_started(&self) -> bool {
        self.started.len() == self.workers.len()
    }

    /// Number of workers that have answered a probe.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started.len()
    }

    /// Whether the worker at `index` has answered a probe.
    #[must_use]
    pub fn is_started(&self, index: usize) -> bool {
        self.started.contains(&index)
    }

    /// Derived lifecycle state of the worker at `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<WorkerState> {
        self.workers.get(index).map(|_| {
            WorkerState::derive(self.started.contains(&index), self.guard.is_held(index))
        })
    }

    /// Name and derived state of every worker, in index order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, WorkerState)> {
        self.workers
            .iter()
            .filter_map(|worker| {
                self.state(worker.index())
                    .map(|state| (worker.name().to_owned(), state))
            })
            .collect()
    }

    /// Clients connected across workers, as of each worker's last probe.
    #[must_use]
    pub fn connected_clients(&self) -> u64 {
        self.online
            .iter()
            .map(|entry| u64::from(*entry.value()))
            .sum()
    }
}

/// Spawn the recurring health-check loop.
///
/// Passes are started every `interval` until `cancel` fires. A pass does
/// not wait for the previous one, so a slow restart never delays probes.
#[must_use]
pub fn spawn_health_loop(
    orchestrator: Arc<HealthOrchestrator>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("health-check loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let probes = orchestrator.spawn_health_pass().len();
                    debug!(
                        probes,
                        started = orchestrator.started_count(),
                        restarting = orchestrator.restart_guard().held_count(),
                        "health-check pass started"
                    );
                }
            }
        }
    })
}
