//! Integration tests for the fan-out primitives combined with the runtime
//! re-exports other crates rely on.

use core_async::sync::{Mutex, Semaphore};
use core_async::throttle::{settle_all, settle_chunked, SettleError};
use core_async::time::{sleep, timeout, Duration};
use core_async::task;
use std::sync::Arc;

#[tokio::test]
async fn test_spawned_task_joins() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn test_factories_are_not_started_before_a_slot_frees() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Semaphore::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|n| {
            let started = started.clone();
            let gate = gate.clone();
            move || async move {
                started.lock().await.push(n);
                let _permit = gate.acquire().await.unwrap();
                n
            }
        })
        .collect();

    let run = task::spawn(settle_all(1, tasks));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(*started.lock().await, vec![0]);

    gate.add_permits(3);
    let results = timeout(Duration::from_secs(1), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(results, vec![0, 1, 2]);
    assert_eq!(*started.lock().await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_chunked_results_match_input_order_across_chunks() {
    let tasks: Vec<_> = (0..7u64)
        .map(|n| {
            move || async move {
                sleep(Duration::from_millis(7 - n)).await;
                n * 10
            }
        })
        .collect();

    let results = settle_chunked(3, tasks).await.unwrap();
    assert_eq!(results, vec![0, 10, 20, 30, 40, 50, 60]);
}

#[tokio::test]
async fn test_chunked_panic_is_reported_with_global_index() {
    let tasks: Vec<_> = (0..4)
        .map(|n| {
            move || async move {
                if n == 2 {
                    panic!("worker lost");
                }
                n
            }
        })
        .collect();

    match settle_chunked(2, tasks).await {
        Err(SettleError::Join { index, message }) => {
            assert_eq!(index, 2);
            assert!(message.contains("panic"));
        }
        other => panic!("expected join failure, got {other:?}"),
    }
}
