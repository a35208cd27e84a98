// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use keelwork_runloop::{Execute, Fifo, Job, JobError};

struct Increments(Arc<AtomicUsize>);
impl Execute for Increments {
    fn execute(&mut self, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn dispatch_runs_the_job_on_a_pooled_queue() {
    let pool = WorkerPool::new("wp", 1, 2, 1, || Box::new(Fifo::new(None)));
    let counter = Arc::new(AtomicUsize::new(0));
    let ran = pool.dispatch(Arc::new(Job::new(Increments(counter.clone()))), true, Deadline::after(Some(Duration::from_secs(5))));
    assert!(ran.unwrap());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn dispatch_fails_once_every_queue_is_checked_out() {
    let pool = WorkerPool::new("wp-exhausted", 0, 1, 1, || Box::new(Fifo::new(None)));
    let held = pool.pool.get();
    assert!(held.is_ok());
    let counter = Arc::new(AtomicUsize::new(0));
    let result = pool.dispatch(Arc::new(Job::new(Increments(counter))), false, Deadline::Never);
    assert!(result.is_err());
}

#[test]
fn wait_for_idle_blocks_until_the_borrowed_queue_returns() {
    let pool = WorkerPool::new("wp-idle", 1, 1, 1, || Box::new(Fifo::new(None)));
    let guard = pool.pool.get().unwrap();
    let waiter_pool = pool.clone();
    let waiter = std::thread::spawn(move || waiter_pool.wait_for_idle(Deadline::after(Some(Duration::from_secs(5)))));
    std::thread::sleep(Duration::from_millis(50));
    drop(guard);
    assert!(waiter.join().unwrap());
}
