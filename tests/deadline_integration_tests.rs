//! Integration tests for the deadline

mod common;

use breakwater::prelude::*;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_ignored_stop_signal_still_times_out() {
    common::init_tracing();
    let deadline = Deadline::new(Duration::from_millis(5));

    let start = Instant::now();
    let err = assert_err!(deadline.run(|_stop| {
        thread::sleep(Duration::from_secs(1));
        Ok::<_, io::Error>(())
    }));

    assert!(err.is_timed_out());
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_fast_work_wins_the_race() {
    common::init_tracing();
    let deadline = Deadline::new(Duration::from_millis(5));

    let start = Instant::now();
    let value = assert_ok!(deadline.run(|_stop| {
        thread::sleep(Duration::from_millis(1));
        Ok::<_, io::Error>("fast")
    }));

    assert_eq!(value, "fast");
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_concurrent_runs_are_independent() {
    common::init_tracing();
    let deadline = Deadline::new(Duration::from_millis(50));

    let slow = thread::spawn(move || {
        deadline.run(|_stop| {
            thread::sleep(Duration::from_millis(500));
            Ok::<_, io::Error>(())
        })
    });
    let fast = thread::spawn(move || deadline.run(|_stop| Ok::<_, io::Error>(1)));

    assert_eq!(assert_ok!(fast.join().unwrap()), 1);
    assert!(assert_err!(slow.join().unwrap()).is_timed_out());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_work_keeps_running_after_timeout() {
    common::init_tracing();
    let deadline = Deadline::new(Duration::from_millis(5));
    let finished = Arc::new(AtomicBool::new(false));

    let start = Instant::now();
    let flag = finished.clone();
    let err = assert_err!(
        deadline
            .run_async(|_stop| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await
    );
    assert!(err.is_timed_out());
    assert!(start.elapsed() < Duration::from_millis(50));
    assert!(!finished.load(Ordering::SeqCst));

    // The task is detached, not aborted
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_async_work_error_passes_through() {
    common::init_tracing();
    let deadline = Deadline::new(Duration::from_millis(100));

    let err = assert_err!(
        deadline
            .run_async(|_stop| async {
                Err::<(), _>(io::Error::new(io::ErrorKind::InvalidData, "bad payload"))
            })
            .await
    );

    assert!(!err.is_timed_out());
    assert_eq!(err.into_inner().unwrap().kind(), io::ErrorKind::InvalidData);
}
