use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use pool_warden::{config::GlobalConfig, AppError};

fn sample_toml(root: &str) -> String {
    format!(
        r#"
[pool]
host = "10.0.0.5"
name_prefix = "uhc-"
ports = [25510, 25511, 25512, 25513, 25514]

[paths]
servers_root = '{root}/servers'
base_dir = '{root}/base'
properties_dir = '{root}/properties'
snapshots_dir = '{root}/worlds/overworlds'
snapshot_count = 4

[launch]
start_script = "start.sh"
multiplexer = "screen"

[health]
interval_seconds = 20
probe_timeout_seconds = 3
restart_guard_ttl_seconds = 90

[metrics]
key = "players"
interval_millis = 250
credentials_file = "redis.json"

[admission]
deny_message = "warming up"

[permissions]
server_command = ["Alice", "bob"]
"#
    )
}

fn minimal_toml(root: &str) -> String {
    format!(
        r#"
[pool]
ports = [25510, 25511]

[paths]
servers_root = '{root}/servers'
base_dir = '{root}/base'
properties_dir = '{root}/properties'
snapshots_dir = '{root}/worlds'
"#
    )
}

#[test]
fn parses_valid_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml("/srv/pool")).expect("config parses");

    assert_eq!(config.pool.host, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
    assert_eq!(config.pool_size(), 5);
    assert_eq!(config.paths.snapshot_count, 4);
    assert_eq!(config.launch.start_script, "start.sh");
    assert_eq!(config.launch.multiplexer, "screen");
    assert_eq!(config.health_interval(), Duration::from_secs(20));
    assert_eq!(config.probe_timeout(), Duration::from_secs(3));
    assert_eq!(config.restart_guard_ttl(), Duration::from_secs(90));
    assert_eq!(config.metrics.key, "players");
    assert_eq!(config.metrics_interval(), Duration::from_millis(250));
    assert_eq!(config.admission.deny_message, "warming up");
    assert!(config.metrics.sink.is_none(), "sink is not populated from TOML");
}

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str(&minimal_toml("/srv/pool")).expect("config parses");

    assert_eq!(config.pool.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(config.pool.name_prefix, "uhc-");
    assert_eq!(config.paths.snapshot_subdir, "world");
    assert_eq!(config.paths.snapshot_count, 10);
    assert!(config.paths.snapshots_enabled);
    assert_eq!(config.paths.config_file_name, "server.properties");
    assert_eq!(config.launch.start_script, "start");
    assert_eq!(config.launch.multiplexer, "tmux");
    assert_eq!(config.health_interval(), Duration::from_secs(15));
    assert_eq!(config.probe_timeout(), Duration::from_secs(5));
    assert_eq!(config.restart_guard_ttl(), Duration::from_secs(60));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.key, "playercount");
    assert_eq!(config.metrics_interval(), Duration::from_millis(10));
    assert_eq!(config.admission.deny_message, "(!) Eris is still starting");
    assert_eq!(
        config.permissions.server_command_node,
        "velocity.command.server"
    );
}

#[test]
fn empty_port_table_is_rejected() {
    let toml = minimal_toml("/srv/pool").replace("ports = [25510, 25511]", "ports = []");

    let err = GlobalConfig::from_toml_str(&toml).expect_err("empty pool rejected");

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("pool.ports")));
}

#[test]
fn duplicate_ports_are_rejected() {
    let toml = minimal_toml("/srv/pool").replace("[25510, 25511]", "[25510, 25510]");

    let err = GlobalConfig::from_toml_str(&toml).expect_err("duplicate port rejected");

    assert!(err.to_string().contains("duplicate port 25510"));
}

#[test]
fn zero_probe_timeout_is_rejected() {
    let toml = format!(
        "{}\n[health]\nprobe_timeout_seconds = 0\n",
        minimal_toml("/srv/pool")
    );

    assert!(GlobalConfig::from_toml_str(&toml).is_err());
}

#[test]
fn zero_guard_ttl_is_rejected() {
    let toml = sample_toml("/srv/pool").replace(
        "restart_guard_ttl_seconds = 90",
        "restart_guard_ttl_seconds = 0",
    );

    let err = GlobalConfig::from_toml_str(&toml).expect_err("zero ttl rejected");

    assert!(
        matches!(err, AppError::Config(ref msg) if msg.contains("restart_guard_ttl_seconds")),
        "got {err}"
    );
}

#[test]
fn zero_snapshots_rejected_only_when_enabled() {
    let base = minimal_toml("/srv/pool").replace(
        "snapshots_dir = '/srv/pool/worlds'",
        "snapshots_dir = '/srv/pool/worlds'\nsnapshot_count = 0",
    );
    assert!(GlobalConfig::from_toml_str(&base).is_err());

    let disabled = base.replace(
        "snapshot_count = 0",
        "snapshot_count = 0\nsnapshots_enabled = false",
    );
    assert!(GlobalConfig::from_toml_str(&disabled).is_ok());
}

#[test]
fn missing_paths_section_is_rejected() {
    let err = GlobalConfig::from_toml_str("[pool]\nports = [25510]\n")
        .expect_err("paths are required");

    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn load_from_path_resolves_credentials_next_to_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, sample_toml("/srv/pool")).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");

    assert_eq!(config.metrics.credentials_file, temp.path().join("redis.json"));
}

#[test]
fn load_from_missing_path_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let err = GlobalConfig::load_from_path(temp.path().join("absent.toml"))
        .expect_err("missing file is fatal");

    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn server_command_permission_is_allow_listed() {
    let config = GlobalConfig::from_toml_str(&sample_toml("/srv/pool")).expect("config parses");

    assert!(config.is_permitted("alice", "velocity.command.server"));
    assert!(config.is_permitted("BOB", "velocity.command.server"));
    assert!(!config.is_permitted("mallory", "velocity.command.server"));
    assert!(!config.is_permitted("alice", "velocity.command.glist"));
}
