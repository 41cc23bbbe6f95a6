//! Worker working-directory staging.
//!
//! Materializes a worker's directory from the base template, a randomly
//! chosen content snapshot, and the per-index properties file. Every call
//! starts from a clean slate so re-running after a partial failure is safe.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, info_span};
use walkdir::WalkDir;

use crate::config::PathsConfig;
use crate::models::WorkerRecord;
use crate::{AppError, Result};

/// Source of the snapshot index copied into a worker directory.
pub trait SnapshotPicker: Send + Sync {
    /// Pick an index in `0..count`. `count` is always non-zero; an index
    /// outside that range fails provisioning.
    fn pick(&self, count: u32) -> u32;
}

/// Uniform random snapshot selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSnapshot;

impl SnapshotPicker for RandomSnapshot {
    fn pick(&self, count: u32) -> u32 {
        rand::rng().random_range(0..count)
    }
}

/// Always selects the same snapshot, even when it is out of range.
#[derive(Debug, Clone, Copy)]
pub struct FixedSnapshot(pub u32);

impl SnapshotPicker for FixedSnapshot {
    fn pick(&self, _count: u32) -> u32 {
        self.0
    }
}

/// Stages worker directories from templates.
pub struct Provisioner {
    paths: PathsConfig,
    picker: Arc<dyn SnapshotPicker>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create a provisioner over the configured template directories.
    #[must_use]
    pub fn new(paths: PathsConfig, picker: Arc<dyn SnapshotPicker>) -> Self {
        Self { paths, picker }
    }

    /// Stage `worker`'s working directory.
    ///
    /// Steps run in order and the first failure aborts the call, leaving
    /// any partial state in place:
    /// 1. Create the shared servers root.
    /// 2. Remove an existing worker directory.
    /// 3. Copy the base template.
    /// 4. Copy a snapshot over the snapshot subdirectory (when enabled).
    /// 5. Copy `<index>.properties` to the canonical config filename.
    ///
    /// This is blocking filesystem work; async callers should run it on the
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Provision` on any filesystem failure.
    pub fn provision(&self, worker: &WorkerRecord) -> Result<()> {
        let span = info_span!("provision", worker = worker.name());
        let _guard = span.enter();

        let target = worker.working_dir();

        fs::create_dir_all(&self.paths.servers_root).map_err(|err| {
            AppError::Provision(format!(
                "failed to create servers root {}: {err}",
                self.paths.servers_root.display()
            ))
        })?;

        if target.is_dir() {
            fs::remove_dir_all(target).map_err(|err| {
                AppError::Provision(format!(
                    "failed to remove stale directory {}: {err}",
                    target.display()
                ))
            })?;
            debug!(path = %target.display(), "stale worker directory removed");
        }

        let base_files = copy_dir_recursive(&self.paths.base_dir, target)?;

        let snapshot = if self.paths.snapshots_enabled {
            Some(self.copy_snapshot(target)?)
        } else {
            None
        };

        let properties = self
            .paths
            .properties_dir
            .join(format!("{}.properties", worker.index()));
        let config_path = target.join(&self.paths.config_file_name);
        fs::copy(&properties, &config_path).map_err(|err| {
            AppError::Provision(format!(
                "failed to copy {} to {}: {err}",
                properties.display(),
                config_path.display()
            ))
        })?;

        info!(base_files, ?snapshot, "worker directory provisioned");
        Ok(())
    }

    fn copy_snapshot(&self, target: &Path) -> Result<u32> {
        if self.paths.snapshot_count == 0 {
            return Err(AppError::Provision("no snapshots available".into()));
        }

        let choice = self.picker.pick(self.paths.snapshot_count);
        if choice >= self.paths.snapshot_count {
            return Err(AppError::Provision(format!(
                "snapshot {choice} out of range 0..{}",
                self.paths.snapshot_count
            )));
        }
        let source = self.paths.snapshots_dir.join(choice.to_string());
        copy_dir_recursive(&source, &target.join(&self.paths.snapshot_subdir))?;
        Ok(choice)
    }
}

/// Recursively copy `src` into `dst`, merging with any existing content.
///
/// Existing files at the destination are overwritten; files present only
/// at the destination are kept. Returns the number of files copied.
///
/// # Errors
///
/// Returns `AppError::Provision` if `src` cannot be walked or any entry
/// fails to copy.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<u64> {
    let mut copied = 0u64;

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|err| {
            AppError::Provision(format!("failed to walk {}: {err}", src.display()))
        })?;

        let relative = entry.path().strip_prefix(src).map_err(|err| {
            AppError::Provision(format!(
                "entry {} escapes {}: {err}",
                entry.path().display(),
                src.display()
            ))
        })?;
        let destination = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|err| {
                AppError::Provision(format!(
                    "failed to create {}: {err}",
                    destination.display()
                ))
            })?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|err| {
                AppError::Provision(format!(
                    "failed to copy {} to {}: {err}",
                    entry.path().display(),
                    destination.display()
                ))
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}
