// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn join_returns_result_once_thread_completes() {
    let t = NamedThread::spawn("worker-0", Priority::Normal, || 42).unwrap();
    assert_eq!(t.name(), "worker-0");
    assert_eq!(t.join(Some(Duration::from_secs(1))), Some(42));
}

#[test]
fn join_times_out_while_thread_still_running() {
    let t = NamedThread::spawn("slow", Priority::Low, || {
        std::thread::sleep(Duration::from_millis(200));
        1
    })
    .unwrap();
    assert_eq!(t.join(Some(Duration::from_millis(10))), None);
}

#[test]
fn detach_does_not_block() {
    let t = NamedThread::spawn("detached", Priority::Normal, || {
        std::thread::sleep(Duration::from_millis(50));
    })
    .unwrap();
    let start = std::time::Instant::now();
    t.detach();
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn is_finished_reflects_completion() {
    let t = NamedThread::spawn("quick", Priority::Normal, || {}).unwrap();
    // join blocks until completion, so by construction this should be near-instant.
    assert_eq!(t.join(Some(Duration::from_secs(1))), Some(()));
}
