//! Integration tests for pool bootstrap and the recurring health loop.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pool_warden::orchestrator::{spawn_health_loop, Reaction};
use pool_warden::router::Router;

use super::test_helpers::{pool, Pool};

#[tokio::test]
async fn bootstrap_provisions_starts_and_registers_every_worker() {
    let pool = pool(3);

    assert_eq!(pool.orchestrator.bootstrap().await, 3);

    let registered = pool.router.registered();
    assert_eq!(registered.len(), 3);
    for index in 0..3 {
        assert_eq!(registered[index], (Pool::name(index), Pool::endpoint(index)));
        let dir = pool.servers_root().join(Pool::name(index));
        assert!(dir.join("server.jar").is_file());
        assert!(dir.join("plugins").join("game.jar").is_file());
        let properties = std::fs::read_to_string(dir.join("server.properties")).unwrap();
        assert!(properties.contains(&format!("server-port={}", Pool::endpoint(index).port())));
        assert_eq!(pool.process.starts(&Pool::name(index)), 1);
    }
}

#[tokio::test]
async fn failed_launch_leaves_worker_unregistered() {
    let pool = pool(3);
    pool.process.fail_start_for("uhc-1");

    assert_eq!(pool.orchestrator.bootstrap().await, 2);

    let names: Vec<String> = pool
        .router
        .registered()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["uhc-0".to_owned(), "uhc-2".to_owned()]);

    pool.set_all_alive(0);
    let reactions = pool.run_pass().await;

    assert_eq!(reactions, vec![Reaction::Loaded, Reaction::Loaded]);
    assert!(!pool.orchestrator.all_started(), "unregistered worker is never probed");
}

#[tokio::test]
async fn health_loop_runs_passes_until_cancelled() {
    let pool = pool(2);
    assert_eq!(pool.orchestrator.bootstrap().await, 2);
    pool.set_all_alive(1);

    let cancel = CancellationToken::new();
    let handle = spawn_health_loop(
        std::sync::Arc::clone(&pool.orchestrator),
        Duration::from_millis(20),
        cancel.clone(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !pool.orchestrator.all_started() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "pool never became ready"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop exits after cancel")
        .expect("loop task does not panic");

    assert_eq!(pool.orchestrator.connected_clients(), 2);
}
