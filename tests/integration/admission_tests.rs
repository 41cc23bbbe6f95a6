//! Integration tests for login gating on pool readiness.

use std::sync::Arc;

use pool_warden::orchestrator::{Admission, AdmissionGate};

use super::test_helpers::{bootstrapped_pool, Pool};

const DENY: &str = "(!) Eris is still starting";

#[tokio::test]
async fn logins_denied_until_every_worker_loaded() {
    let pool = bootstrapped_pool(3).await;
    let gate = AdmissionGate::new(Arc::clone(&pool.orchestrator), DENY);

    assert_eq!(
        gate.check(),
        Admission::Denied {
            message: DENY.to_owned(),
            loaded: 0,
            expected: 3,
        }
    );

    pool.probe.set_alive(Pool::endpoint(0), 0);
    pool.run_pass().await;

    let decision = gate.check();
    assert!(!decision.is_allowed());
    assert!(matches!(decision, Admission::Denied { loaded: 1, expected: 3, .. }));

    pool.set_all_alive(0);
    pool.run_pass().await;

    assert_eq!(gate.check(), Admission::Allowed);
}

#[tokio::test]
async fn restart_does_not_close_the_gate() {
    let pool = bootstrapped_pool(2).await;
    pool.start_all().await;
    let gate = AdmissionGate::new(Arc::clone(&pool.orchestrator), DENY);

    pool.probe.set_dead(Pool::endpoint(0));
    pool.run_pass().await;

    assert!(pool.orchestrator.restart_guard().is_held(0));
    assert!(gate.check().is_allowed());
}
