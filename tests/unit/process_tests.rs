//! Unit tests for the shell-script process controller.

use std::net::SocketAddr;
use std::path::Path;

use pool_warden::config::LaunchConfig;
use pool_warden::models::WorkerRecord;
use pool_warden::orchestrator::{ProcessControl, ShellProcessControl};
use pool_warden::AppError;

fn worker(dir: &Path) -> WorkerRecord {
    WorkerRecord::new(
        0,
        "uhc-0".into(),
        SocketAddr::from(([127, 0, 0, 1], 25510)),
        dir.to_path_buf(),
    )
}

#[cfg(unix)]
#[tokio::test]
async fn start_runs_script_with_session_argument() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let script = temp.path().join("start");
    std::fs::write(&script, "#!/bin/sh\necho \"$1\" > started-as\n").expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let control = ShellProcessControl::new(LaunchConfig::default());
    let handle = control.start(&worker(temp.path())).expect("start succeeds");

    assert_eq!(handle.session, "uhc-0");
    assert!(handle.pid.is_some());

    let marker = temp.path().join("started-as");
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !marker.is_file() {
        assert!(std::time::Instant::now() < deadline, "script never ran");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        std::fs::read_to_string(marker).expect("marker").trim(),
        "uhc-0"
    );
}

#[tokio::test]
async fn start_without_script_is_launch_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let control = ShellProcessControl::new(LaunchConfig::default());

    let err = control
        .start(&worker(temp.path()))
        .expect_err("missing script");

    assert!(matches!(err, AppError::Launch(ref msg) if msg.contains("uhc-0")));
}

#[test]
fn kill_with_missing_multiplexer_is_kill_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let control = ShellProcessControl::new(LaunchConfig {
        start_script: "start".into(),
        multiplexer: "pool-warden-no-such-binary".into(),
    });

    let err = control.kill(&worker(temp.path())).expect_err("no binary");

    assert!(err.to_string().starts_with("kill:"));
}

#[cfg(unix)]
#[test]
fn kill_of_absent_session_is_not_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let control = ShellProcessControl::new(LaunchConfig {
        start_script: "start".into(),
        multiplexer: "false".into(),
    });

    control
        .kill(&worker(temp.path()))
        .expect("non-zero exit is tolerated");
}
