//! Tests for tokio spawner utilities

use std::sync::mpsc;
use std::time::Duration;

use audit_trail::core::Spawn;
use audit_trail::runtime::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_dedicated_runtime_spawner() {
    let spawner = TokioSpawner::with_worker_threads(1).expect("runtime");

    let (tx, rx) = mpsc::channel();
    spawner.spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send("flushed").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "flushed");
}

#[test]
fn test_dedicated_runtime_per_cpu() {
    let spawner = TokioSpawner::dedicated().expect("runtime");
    let clone = spawner.clone();
    drop(spawner);

    let (tx, rx) = mpsc::channel();
    clone.spawn(async move {
        tx.send(()).unwrap();
    });
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
}
