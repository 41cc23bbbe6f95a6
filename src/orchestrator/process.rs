//! Worker process start and termination.
//!
//! Workers are launched through their start script and terminated by
//! multiplexer session name, so a worker left running by a previous
//! supervisor instance can still be killed without a retained handle.

use std::process::Stdio;

use tracing::{info, warn};

use crate::config::LaunchConfig;
use crate::models::WorkerRecord;
use crate::{AppError, Result};

/// Identifies a launched worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// OS process id of the start script, if the platform reported one.
    pub pid: Option<u32>,
    /// Session name the worker runs under.
    pub session: String,
}

/// Starts and terminates worker processes.
///
/// Both operations only issue the request; the health orchestrator confirms
/// the outcome through later probes. Implementations block the calling
/// thread and are invoked from the blocking pool.
pub trait ProcessControl: Send + Sync {
    /// Launch `worker` detached from the supervisor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Launch` if the process cannot be spawned.
    fn start(&self, worker: &WorkerRecord) -> Result<ProcessHandle>;

    /// Terminate `worker`'s session by name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kill` if the termination command cannot be run.
    fn kill(&self, worker: &WorkerRecord) -> Result<()>;
}

/// Shell-script launcher with multiplexer-based termination.
#[derive(Debug, Clone)]
pub struct ShellProcessControl {
    launch: LaunchConfig,
}

impl ShellProcessControl {
    /// Create a controller using the configured script and multiplexer.
    #[must_use]
    pub fn new(launch: LaunchConfig) -> Self {
        Self { launch }
    }
}

impl ProcessControl for ShellProcessControl {
    /// Must run inside a tokio runtime context; the runtime reaps the
    /// detached child once it exits.
    fn start(&self, worker: &WorkerRecord) -> Result<ProcessHandle> {
        let script = worker.working_dir().join(&self.launch.start_script);

        let child = tokio::process::Command::new(&script)
            .arg(worker.session())
            .current_dir(worker.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|err| {
                AppError::Launch(format!(
                    "failed to spawn {} for {}: {err}",
                    script.display(),
                    worker.name()
                ))
            })?;

        let handle = ProcessHandle {
            pid: child.id(),
            session: worker.session().to_owned(),
        };

        info!(
            worker = worker.name(),
            pid = handle.pid.unwrap_or(0),
            "worker process spawned"
        );

        Ok(handle)
    }

    fn kill(&self, worker: &WorkerRecord) -> Result<()> {
        let status = std::process::Command::new(&self.launch.multiplexer)
            .args(["kill-session", "-t", worker.session()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| {
                AppError::Kill(format!(
                    "failed to run {} for {}: {err}",
                    self.launch.multiplexer,
                    worker.session()
                ))
            })?;

        if status.success() {
            info!(worker = worker.name(), "worker session killed");
        } else {
            // Session already gone; nothing left to terminate.
            warn!(
                worker = worker.name(),
                code = status.code().unwrap_or(-1),
                "kill-session exited unsuccessfully"
            );
        }

        Ok(())
    }
}
