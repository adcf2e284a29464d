//! Integration tests for the runtime abstraction.

use core_async::{sync, task, time};

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_task_spawn_blocking() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    let result = handle.await.unwrap();
    assert_eq!(result, 100);
}

#[tokio::test]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(500), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[tokio::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(500)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_abort_handle_stops_task() {
    let handle = task::spawn(async {
        time::sleep(time::Duration::from_secs(60)).await;
    });
    handle.abort();

    let err = handle.await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancellation_reaches_spawned_worker() {
    let token = sync::CancellationToken::new();
    let worker_token = token.child_token();

    let worker = task::spawn(async move {
        sync::cancellable(&worker_token, time::sleep(time::Duration::from_secs(60))).await
    });

    token.cancel();
    let outcome = time::timeout(time::Duration::from_secs(5), worker)
        .await
        .expect("worker should observe cancellation")
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_broadcast_channel() {
    let (tx, mut rx1) = sync::broadcast::channel::<u32>(8);
    let mut rx2 = tx.subscribe();

    tx.send(7).unwrap();

    assert_eq!(rx1.recv().await.unwrap(), 7);
    assert_eq!(rx2.recv().await.unwrap(), 7);
}

#[test]
fn test_block_on() {
    let value = core_async::runtime::block_on(async { 5 + 5 });
    assert_eq!(value, 10);
}
