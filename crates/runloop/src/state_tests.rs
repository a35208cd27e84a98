// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::job::{Execute, Job, JobError};
use crate::policy::Fifo;

struct Succeeds;
impl Execute for Succeeds {
    fn execute(&mut self, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        Ok(())
    }
}

fn state() -> RunLoopState {
    RunLoopState::new("test", Box::new(Fifo::new(None)))
}

#[test]
fn enq_then_next_job_moves_pending_to_running() {
    let state = state();
    let job = Arc::new(Job::new(Succeeds));
    state.enq(job.clone(), false, Deadline::Never).unwrap();
    assert_eq!(state.get_pending_jobs().len(), 1);

    let popped = state.next_job().unwrap();
    assert_eq!(popped.id(), job.id());
    assert_eq!(state.get_pending_jobs().len(), 0);
    assert_eq!(state.get_running_jobs().len(), 1);
}

#[test]
fn enq_with_wait_blocks_until_the_job_completes() {
    let state = Arc::new(state());
    let job = Arc::new(Job::new(Succeeds));
    let worker_state = state.clone();
    let worker = std::thread::spawn(move || loop {
        if worker_state.run_one() {
            break;
        }
    });
    let ok = state.enq(job, true, Deadline::Never).unwrap();
    assert!(ok);
    worker.join().unwrap();
}

#[test]
fn cancel_pending_job_is_reaped_without_running() {
    let state = Arc::new(state());
    let job = Arc::new(Job::new(Succeeds));
    state.enq(job.clone(), false, Deadline::Never).unwrap();
    assert!(state.cancel_job(job.id()));

    // next_job() reaps the cancelled-while-pending job and then blocks
    // looking for the next one; stop() is what wakes it back up.
    let worker_state = state.clone();
    let worker = std::thread::spawn(move || worker_state.next_job());

    assert!(job.wait(Deadline::after(Some(Duration::from_millis(500)))));
    assert_eq!(job.disposition(), Disposition::Cancelled);
    assert_eq!(state.get_all_jobs().len(), 0);

    state.stop(false, false);
    assert!(worker.join().unwrap().is_none());
}

#[test]
fn stop_with_cancel_pending_completes_every_pending_job() {
    let state = state();
    let jobs: Vec<_> = (0..3).map(|_| Arc::new(Job::new(Succeeds))).collect();
    for job in &jobs {
        state.enq(job.clone(), false, Deadline::Never).unwrap();
    }
    state.stop(false, true);
    for job in &jobs {
        assert!(job.wait(Deadline::after(Some(Duration::from_millis(500)))));
        assert_eq!(job.disposition(), Disposition::Cancelled);
    }
    assert!(state.next_job().is_none());
}

#[test]
fn enq_after_stop_is_rejected() {
    let state = state();
    state.stop(false, false);
    let err = state.enq(Arc::new(Job::new(Succeeds)), false, Deadline::Never).unwrap_err();
    assert!(matches!(err, Error::Stopped));
}

#[test]
fn wait_for_idle_returns_once_both_lists_are_empty() {
    let state = Arc::new(state());
    let job = Arc::new(Job::new(Succeeds));
    state.enq(job, false, Deadline::Never).unwrap();

    let worker_state = state.clone();
    let worker = std::thread::spawn(move || {
        worker_state.run_one();
    });
    assert!(state.wait_for_idle(Deadline::after(Some(Duration::from_secs(5)))));
    worker.join().unwrap();
}

#[test]
fn pause_blocks_dequeue_until_resume() {
    let state = Arc::new(state());
    state.pause(false, Deadline::Never);
    let job = Arc::new(Job::new(Succeeds));
    state.enq(job.clone(), false, Deadline::Never).unwrap();

    let worker_state = state.clone();
    let worker = std::thread::spawn(move || worker_state.next_job());

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(state.get_pending_jobs().len(), 1, "job should still be pending while paused");

    state.resume();
    let popped = worker.join().unwrap();
    assert_eq!(popped.unwrap().id(), job.id());
}

#[test]
fn get_stats_reflects_completed_jobs() {
    let state = state();
    for _ in 0..3 {
        state.enq(Arc::new(Job::new(Succeeds)), false, Deadline::Never).unwrap();
        state.run_one();
    }
    let stats = state.get_stats();
    assert_eq!(stats.total_jobs, 3);

    state.reset_stats();
    assert_eq!(state.get_stats().total_jobs, 0);
}
