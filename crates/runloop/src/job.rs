// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A unit of work executed by a run-loop: identity, lifecycle state,
//! completion disposition, and the two signals a worker and a waiting
//! caller coordinate on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use keelwork_core::{define_id, Deadline, ManualResetEvent};
use parking_lot::Mutex;

define_id! {
    /// Identifies a job across its lifetime, even across reuse.
    pub struct JobId("job-");
}

define_id! {
    /// Identifies the run-loop (or job queue, or pipeline) that owns a job.
    pub struct RunLoopId("loop-");
}

/// Lifecycle position of a job. Transitions are monotonic
/// Pending -> Running -> Completed for a single execution; a run-loop may
/// reuse a Completed job by resetting it back to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
}

/// The completion verdict of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Unknown,
    Cancelled,
    Failed,
    Succeeded,
}

/// The structured failure payload stored on a job when `disposition == Failed`.
#[derive(Debug, Clone)]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JobError {}

/// User-supplied work, invoked by a worker thread.
///
/// `should_stop` reports true once the job should abandon further work —
/// because the run-loop is terminating or the job itself was cancelled.
/// Implementations that need an interruptable sleep should call
/// [`Job::interruptable_sleep`] rather than `std::thread::sleep`.
pub trait Execute: Send {
    fn prologue(&mut self, _should_stop: &dyn Fn() -> bool) {}

    fn execute(&mut self, should_stop: &dyn Fn() -> bool) -> Result<(), JobError>;

    fn epilogue(&mut self, _should_stop: &dyn Fn() -> bool) {}
}

struct Timestamps {
    created_at: Option<Instant>,
    completed_at: Option<Instant>,
}

/// A job: identity, lifecycle state, disposition, and the work itself.
///
/// Jobs are always held behind `Arc`: workers and callers that waited on a
/// job share ownership past the point the run-loop drops its own reference
/// (the run-loop removes a job from its lists on completion, but a caller
/// holding the `Arc` can still inspect it).
pub struct Job {
    id: JobId,
    run_loop_id: Mutex<Option<RunLoopId>>,
    execute: Mutex<Box<dyn Execute>>,
    state: Mutex<JobState>,
    disposition: Mutex<Disposition>,
    disposition_error: Mutex<Option<JobError>>,
    timestamps: Mutex<Timestamps>,
    /// Fires to wake an interruptable sleep inside `execute` on cancellation.
    interrupt: ManualResetEvent,
    /// Fires once the job reaches `Completed`.
    completed: ManualResetEvent,
    generation: AtomicU64,
}

impl Job {
    pub fn new(execute: impl Execute + 'static) -> Self {
        Self {
            id: JobId::new(),
            run_loop_id: Mutex::new(None),
            execute: Mutex::new(Box::new(execute)),
            state: Mutex::new(JobState::Pending),
            disposition: Mutex::new(Disposition::Unknown),
            disposition_error: Mutex::new(None),
            timestamps: Mutex::new(Timestamps { created_at: None, completed_at: None }),
            interrupt: ManualResetEvent::new(false),
            completed: ManualResetEvent::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn run_loop_id(&self) -> Option<RunLoopId> {
        *self.run_loop_id.lock()
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub fn disposition(&self) -> Disposition {
        *self.disposition.lock()
    }

    pub fn disposition_error(&self) -> Option<JobError> {
        self.disposition_error.lock().clone()
    }

    pub fn created_at(&self) -> Option<Instant> {
        self.timestamps.lock().created_at
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.timestamps.lock().completed_at
    }

    pub fn elapsed(&self) -> Option<std::time::Duration> {
        let ts = self.timestamps.lock();
        Some(ts.completed_at?.saturating_duration_since(ts.created_at?))
    }

    /// True once the job should abandon further work: the run-loop is
    /// terminating, or this job itself was cancelled or already failed.
    pub fn should_stop(&self, terminating: bool) -> bool {
        terminating || matches!(self.disposition(), Disposition::Cancelled | Disposition::Failed)
    }

    /// Mark the job Cancelled and wake any interruptable sleep inside `execute`.
    pub fn cancel(&self) {
        *self.disposition.lock() = Disposition::Cancelled;
        self.interrupt.signal();
    }

    /// Block the calling thread until cancellation fires or `deadline`
    /// passes. Intended to be called from inside `execute` in place of
    /// `thread::sleep`, so cancellation wakes it promptly.
    pub fn interruptable_sleep(&self, deadline: Deadline) -> bool {
        self.interrupt.wait(deadline)
    }

    /// Block until this job reaches `Completed` or `deadline` passes.
    pub fn wait(&self, deadline: Deadline) -> bool {
        self.completed.wait(deadline)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_signaled()
    }

    /// Reset a (possibly previously-completed) job back to Pending under a
    /// new run-loop id, ready for re-enqueue.
    pub(crate) fn reset_for_enqueue(&self, run_loop_id: RunLoopId) {
        *self.run_loop_id.lock() = Some(run_loop_id);
        *self.state.lock() = JobState::Pending;
        *self.disposition.lock() = Disposition::Unknown;
        *self.disposition_error.lock() = None;
        self.interrupt.reset();
        self.completed.reset();
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut ts = self.timestamps.lock();
        ts.created_at = None;
        ts.completed_at = None;
    }

    pub(crate) fn begin_running(&self) {
        *self.state.lock() = JobState::Running;
        self.timestamps.lock().created_at = Some(Instant::now());
    }

    /// Mark the job Completed without ever running it — used when a job is
    /// found already cancelled while still sitting in the pending queue.
    pub(crate) fn force_complete(&self) {
        let now = Instant::now();
        {
            let mut ts = self.timestamps.lock();
            if ts.created_at.is_none() {
                ts.created_at = Some(now);
            }
            ts.completed_at = Some(now);
        }
        *self.state.lock() = JobState::Completed;
        self.completed.signal();
    }

    /// Run prologue/execute/epilogue, recording the outcome. A panicking
    /// `execute` is caught and recorded as a failure rather than unwinding
    /// into the worker loop.
    pub(crate) fn run(&self, terminating: &dyn Fn() -> bool) {
        let should_stop = || terminating() || self.should_stop(false);
        {
            let mut exec = self.execute.lock();
            exec.prologue(&should_stop);
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| exec.execute(&should_stop)));
            exec.epilogue(&should_stop);
            match outcome {
                Ok(Ok(())) => {
                    let mut disposition = self.disposition.lock();
                    if *disposition == Disposition::Unknown {
                        *disposition = Disposition::Succeeded;
                    }
                }
                Ok(Err(err)) => {
                    *self.disposition.lock() = Disposition::Failed;
                    *self.disposition_error.lock() = Some(err);
                }
                Err(_) => {
                    *self.disposition.lock() = Disposition::Failed;
                    *self.disposition_error.lock() = Some(JobError::new("job execution panicked"));
                }
            }
        }
        self.timestamps.lock().completed_at = Some(Instant::now());
        *self.state.lock() = JobState::Completed;
        self.completed.signal();
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
