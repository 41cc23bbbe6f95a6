use std::net::SocketAddr;

use pool_warden::router::{LocalRouter, Router};
use pool_warden::AppError;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[test]
fn registered_is_sorted_by_name() {
    let router = LocalRouter::new();
    router.register("uhc-2", addr(25512)).unwrap();
    router.register("uhc-0", addr(25510)).unwrap();
    router.register("uhc-1", addr(25511)).unwrap();

    let names: Vec<String> = router.registered().into_iter().map(|(n, _)| n).collect();

    assert_eq!(names, vec!["uhc-0", "uhc-1", "uhc-2"]);
}

#[test]
fn re_registering_same_endpoint_is_idempotent() {
    let router = LocalRouter::new();
    router.register("uhc-0", addr(25510)).unwrap();

    router.register("uhc-0", addr(25510)).expect("same endpoint accepted");

    assert_eq!(router.registered(), vec![("uhc-0".to_owned(), addr(25510))]);
}

#[test]
fn conflicting_endpoint_is_rejected() {
    let router = LocalRouter::new();
    router.register("uhc-0", addr(25510)).unwrap();

    let err = router
        .register("uhc-0", addr(25599))
        .expect_err("conflict rejected");

    assert!(matches!(err, AppError::Router(ref msg) if msg.contains("already registered")));
    assert_eq!(router.registered()[0].1, addr(25510));
}

#[test]
fn deregister_reports_presence() {
    let router = LocalRouter::new();
    router.register("uhc-0", addr(25510)).unwrap();

    assert!(router.deregister("uhc-0"));
    assert!(!router.deregister("uhc-0"));
    assert!(router.registered().is_empty());
}
