//! Global configuration parsing, validation, and credential loading.

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{AppError, Result};

/// Worker pool layout: where workers listen and how they are named.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Address every worker binds on.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Prefix for worker names; the index is appended (`uhc-0`, `uhc-1`, ...).
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// One fixed port per worker index. The pool size is the table length.
    pub ports: Vec<u16>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_name_prefix() -> String {
    "uhc-".into()
}

/// Template and output directories used when staging a worker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    /// Shared root under which every worker's directory is created.
    pub servers_root: PathBuf,
    /// Base server files copied into every worker directory.
    pub base_dir: PathBuf,
    /// Directory holding `<index>.properties` files.
    pub properties_dir: PathBuf,
    /// Directory holding pre-generated content snapshots `0..snapshot_count`.
    pub snapshots_dir: PathBuf,
    /// Subdirectory of the worker directory the snapshot is copied into.
    #[serde(default = "default_snapshot_subdir")]
    pub snapshot_subdir: String,
    /// Number of pre-generated snapshots available.
    #[serde(default = "default_snapshot_count")]
    pub snapshot_count: u32,
    /// Whether a snapshot is copied at all.
    #[serde(default = "default_true")]
    pub snapshots_enabled: bool,
    /// Canonical configuration filename the worker process reads.
    #[serde(default = "default_config_file_name")]
    pub config_file_name: String,
}

fn default_snapshot_subdir() -> String {
    "world".into()
}

fn default_snapshot_count() -> u32 {
    10
}

fn default_config_file_name() -> String {
    "server.properties".into()
}

fn default_true() -> bool {
    true
}

/// Process launch and termination commands.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchConfig {
    /// Start script name, resolved inside the worker directory.
    #[serde(default = "default_start_script")]
    pub start_script: String,
    /// Terminal multiplexer binary used to kill worker sessions by name.
    #[serde(default = "default_multiplexer")]
    pub multiplexer: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            start_script: default_start_script(),
            multiplexer: default_multiplexer(),
        }
    }
}

fn default_start_script() -> String {
    "start".into()
}

fn default_multiplexer() -> String {
    "tmux".into()
}

/// Health-check cadence and restart deduplication window.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HealthConfig {
    /// Seconds between health-check passes.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Seconds a single liveness probe may take before it counts as failed.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
    /// Seconds a restart guard entry stays live after insertion.
    #[serde(default = "default_restart_guard_ttl_seconds")]
    pub restart_guard_ttl_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            restart_guard_ttl_seconds: default_restart_guard_ttl_seconds(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    15
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_restart_guard_ttl_seconds() -> u64 {
    60
}

/// Connected-client counter publication.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    /// Whether the publisher task runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Key the counter document is written under.
    #[serde(default = "default_metrics_key")]
    pub key: String,
    /// Milliseconds between writes.
    #[serde(default = "default_metrics_interval_millis")]
    pub interval_millis: u64,
    /// JSON document holding the sink connection parameters.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    /// Sink connection parameters (populated at runtime).
    #[serde(skip)]
    pub sink: Option<SinkCredentials>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_metrics_key(),
            interval_millis: default_metrics_interval_millis(),
            credentials_file: default_credentials_file(),
            sink: None,
        }
    }
}

fn default_metrics_key() -> String {
    "playercount".into()
}

fn default_metrics_interval_millis() -> u64 {
    10
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("config.json")
}

/// Login gating text shown while the pool is incomplete.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AdmissionConfig {
    /// Message returned to clients denied admission.
    #[serde(default = "default_deny_message")]
    pub deny_message: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            deny_message: default_deny_message(),
        }
    }
}

fn default_deny_message() -> String {
    "(!) Eris is still starting".into()
}

/// Static allow-list for the server-switch command.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PermissionsConfig {
    /// Permission node guarded by the allow-list.
    #[serde(default = "default_server_command_node")]
    pub server_command_node: String,
    /// Usernames (case-insensitive) allowed to use the command.
    #[serde(default)]
    pub server_command: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            server_command_node: default_server_command_node(),
            server_command: Vec::new(),
        }
    }
}

fn default_server_command_node() -> String {
    "velocity.command.server".into()
}

/// Connection parameters for the metrics sink.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SinkCredentials {
    /// Sink host name.
    pub host: String,
    /// Sink TCP port.
    pub port: u16,
    /// Sink password; empty means no authentication.
    #[serde(default)]
    pub password: String,
}

impl Default for SinkCredentials {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            password: String::new(),
        }
    }
}

/// Shape of the JSON credentials document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct CredentialsDocument {
    redis: SinkCredentials,
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Worker pool layout and static port table.
    pub pool: PoolConfig,
    /// Template and output directories.
    pub paths: PathsConfig,
    /// Process launch and termination commands.
    #[serde(default)]
    pub launch: LaunchConfig,
    /// Health-check cadence.
    #[serde(default)]
    pub health: HealthConfig,
    /// Connected-client counter publication.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Login gating.
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Command allow-list.
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// Relative `metrics.credentials_file` paths are resolved against the
    /// directory containing the config file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        let mut config = Self::from_toml_str(&raw)?;
        if config.metrics.credentials_file.is_relative() {
            if let Some(parent) = path.parent() {
                config.metrics.credentials_file = parent.join(&config.metrics.credentials_file);
            }
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load metrics sink credentials from the JSON credentials document.
    ///
    /// When the document does not exist a default one is written first,
    /// then read back.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the document cannot be written, read,
    /// or parsed.
    pub fn load_credentials(&mut self) -> Result<()> {
        let path = self.metrics.credentials_file.clone();
        if !path.exists() {
            warn!(path = %path.display(), "credentials document missing, writing default");
            write_default_credentials(&path)?;
        }

        let raw = fs::read_to_string(&path)
            .map_err(|err| AppError::Config(format!("failed to read credentials: {err}")))?;
        let document: CredentialsDocument = serde_json::from_str(&raw)?;

        info!(host = %document.redis.host, port = document.redis.port, "sink credentials loaded");
        self.metrics.sink = Some(document.redis);
        Ok(())
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.ports.len()
    }

    /// Interval between health-check passes.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health.interval_seconds)
    }

    /// Deadline for a single liveness probe.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health.probe_timeout_seconds)
    }

    /// Lifetime of a restart guard entry.
    #[must_use]
    pub fn restart_guard_ttl(&self) -> Duration {
        Duration::from_secs(self.health.restart_guard_ttl_seconds)
    }

    /// Interval between metrics writes.
    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics.interval_millis)
    }

    /// Whether `username` holds `permission`.
    ///
    /// Only the server-command node is grantable; every other node is denied.
    /// The front-end proxy's permission provider calls this for each
    /// permission check; the supervisor itself never does.
    #[must_use]
    pub fn is_permitted(&self, username: &str, permission: &str) -> bool {
        permission == self.permissions.server_command_node
            && self
                .permissions
                .server_command
                .iter()
                .any(|name| name.eq_ignore_ascii_case(username))
    }

    fn validate(&self) -> Result<()> {
        if self.pool.ports.is_empty() {
            return Err(AppError::Config("pool.ports must not be empty".into()));
        }

        let mut seen = HashSet::with_capacity(self.pool.ports.len());
        if let Some(dup) = self.pool.ports.iter().find(|port| !seen.insert(**port)) {
            return Err(AppError::Config(format!(
                "pool.ports contains duplicate port {dup}"
            )));
        }

        if self.pool.name_prefix.is_empty() {
            return Err(AppError::Config("pool.name_prefix must not be empty".into()));
        }

        if self.health.interval_seconds == 0 || self.health.probe_timeout_seconds == 0 {
            return Err(AppError::Config(
                "health intervals must be greater than zero".into(),
            ));
        }

        if self.health.restart_guard_ttl_seconds == 0 {
            return Err(AppError::Config(
                "health.restart_guard_ttl_seconds must be greater than zero".into(),
            ));
        }

        if self.metrics.interval_millis == 0 {
            return Err(AppError::Config(
                "metrics.interval_millis must be greater than zero".into(),
            ));
        }

        if self.paths.snapshots_enabled && self.paths.snapshot_count == 0 {
            return Err(AppError::Config(
                "paths.snapshot_count must be greater than zero when snapshots are enabled".into(),
            ));
        }

        Ok(())
    }
}

fn write_default_credentials(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Config(format!("failed to create credentials directory: {err}"))
            })?;
        }
    }

    let body = serde_json::to_string_pretty(&CredentialsDocument::default())?;
    fs::write(path, body)
        .map_err(|err| AppError::Config(format!("failed to write default credentials: {err}")))
}
