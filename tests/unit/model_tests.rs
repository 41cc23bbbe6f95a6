use std::net::SocketAddr;
use std::path::PathBuf;

use pool_warden::config::GlobalConfig;
use pool_warden::models::{WorkerRecord, WorkerState, WorkerTable};

fn config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
[pool]
ports = [25510, 25511, 25512]

[paths]
servers_root = "/srv/servers"
base_dir = "/srv/base"
properties_dir = "/srv/properties"
snapshots_dir = "/srv/worlds"
"#,
    )
    .expect("config parses")
}

#[test]
fn table_assigns_names_ports_and_directories_by_index() {
    let table = WorkerTable::from_config(&config());

    assert_eq!(table.len(), 3);
    let worker = table.get(2).expect("worker 2");
    assert_eq!(worker.index(), 2);
    assert_eq!(worker.name(), "uhc-2");
    assert_eq!(worker.session(), "uhc-2");
    assert_eq!(
        worker.endpoint(),
        "127.0.0.1:25512".parse::<SocketAddr>().unwrap()
    );
    assert_eq!(worker.working_dir(), PathBuf::from("/srv/servers/uhc-2"));
}

#[test]
fn lookup_by_name() {
    let table = WorkerTable::from_config(&config());

    assert_eq!(table.by_name("uhc-1").map(WorkerRecord::index), Some(1));
    assert!(table.by_name("uhc-9").is_none());
    assert!(table.get(3).is_none());
}

#[test]
fn iteration_is_in_index_order() {
    let table = WorkerTable::from_config(&config());

    let indices: Vec<usize> = table.iter().map(WorkerRecord::index).collect();

    assert_eq!(indices, vec![0, 1, 2]);
    assert!(!table.is_empty());
}

#[test]
fn state_is_derived_from_started_and_guard() {
    assert_eq!(WorkerState::derive(false, false), WorkerState::StartingUp);
    assert_eq!(WorkerState::derive(false, true), WorkerState::StartingUp);
    assert_eq!(WorkerState::derive(true, false), WorkerState::Healthy);
    assert_eq!(WorkerState::derive(true, true), WorkerState::Restarting);
}

#[test]
fn state_serializes_snake_case() {
    let json = serde_json::to_string(&WorkerState::StartingUp).expect("serialize");
    assert_eq!(json, "\"starting_up\"");
}
