// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public contract shared by every concrete run-loop: job queues,
//! pipelines, and anything else that accepts jobs and executes them on
//! worker threads.

use std::sync::Arc;

use keelwork_core::Deadline;

use crate::job::{Job, JobId, RunLoopId};
use crate::stats::Statistics;
use crate::state::RunLoopState;
use crate::Result;

/// A concurrent execution context that accepts jobs, runs them on worker
/// threads under a [`crate::policy::JobExecutionPolicy`], and tracks their
/// lifecycle.
///
/// Implementors (job queues, pipelines, worker pools) own the actual
/// threads; this trait only describes the caller-facing surface they share.
pub trait RunLoop: Send + Sync {
    fn id(&self) -> RunLoopId;

    fn name(&self) -> &str;

    /// Start accepting and executing jobs. Idempotent.
    fn start(&self);

    /// Stop the run-loop. `cancel_running` asks in-flight jobs to
    /// cooperatively abandon work; `cancel_pending` drops jobs still waiting
    /// to run, marking each Completed+Cancelled without executing it.
    fn stop(&self, cancel_running: bool, cancel_pending: bool);

    /// Pause dequeuing new jobs. `cancel_running` additionally asks
    /// currently-running jobs to stop. Blocks until no job is executing or
    /// `deadline` passes; returns whether it became idle of running jobs.
    fn pause(&self, cancel_running: bool, deadline: Deadline) -> bool;

    fn resume(&self);

    fn is_paused(&self) -> bool;

    /// Enqueue `job` at the back of the pending queue (subject to the
    /// run-loop's policy). If `wait` is true, blocks until the job
    /// completes or `deadline` passes, returning whether it completed with
    /// a non-Cancelled disposition.
    fn enq(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool>;

    /// As [`RunLoop::enq`], but jumps the queue (subject to policy).
    fn enq_front(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool>;

    fn get_job(&self, id: JobId) -> Option<Arc<Job>>;

    fn get_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> Vec<Arc<Job>>;

    fn get_pending_jobs(&self) -> Vec<Arc<Job>>;

    fn get_running_jobs(&self) -> Vec<Arc<Job>>;

    fn get_all_jobs(&self) -> Vec<Arc<Job>>;

    fn wait_for_job(&self, job: &Arc<Job>, deadline: Deadline) -> bool;

    fn wait_for_jobs(&self, predicate: &dyn Fn(&Job) -> bool, deadline: Deadline) -> bool;

    /// Block until both the pending and running lists are empty (or the
    /// run-loop is paused), or `deadline` passes.
    fn wait_for_idle(&self, deadline: Deadline) -> bool;

    fn cancel_job(&self, id: JobId) -> bool;

    fn cancel_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> usize;

    fn cancel_pending_jobs(&self) -> usize;

    fn cancel_running_jobs(&self) -> usize;

    fn cancel_all_jobs(&self) -> usize;

    fn get_stats(&self) -> Statistics;

    fn reset_stats(&self);
}

/// `RunLoopState` alone is a minimal, threadless [`RunLoop`]: `enq`/`cancel`/
/// query methods all work, but nothing ever calls `next_job` to actually run
/// a pending job. Concrete run-loops (job queues, pipelines) hold an
/// `Arc<RunLoopState>`, spawn worker threads that drive it, and delegate
/// their own `RunLoop` impl to it.
impl RunLoop for RunLoopState {
    fn id(&self) -> RunLoopId {
        RunLoopState::id(self)
    }

    fn name(&self) -> &str {
        RunLoopState::name(self)
    }

    fn start(&self) {
        RunLoopState::start(self)
    }

    fn stop(&self, cancel_running: bool, cancel_pending: bool) {
        RunLoopState::stop(self, cancel_running, cancel_pending)
    }

    fn pause(&self, cancel_running: bool, deadline: Deadline) -> bool {
        RunLoopState::pause(self, cancel_running, deadline)
    }

    fn resume(&self) {
        RunLoopState::resume(self)
    }

    fn is_paused(&self) -> bool {
        RunLoopState::is_paused(self)
    }

    fn enq(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool> {
        RunLoopState::enq(self, job, wait, deadline)
    }

    fn enq_front(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool> {
        RunLoopState::enq_front(self, job, wait, deadline)
    }

    fn get_job(&self, id: JobId) -> Option<Arc<Job>> {
        RunLoopState::get_job(self, id)
    }

    fn get_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> Vec<Arc<Job>> {
        RunLoopState::get_jobs(self, predicate)
    }

    fn get_pending_jobs(&self) -> Vec<Arc<Job>> {
        RunLoopState::get_pending_jobs(self)
    }

    fn get_running_jobs(&self) -> Vec<Arc<Job>> {
        RunLoopState::get_running_jobs(self)
    }

    fn get_all_jobs(&self) -> Vec<Arc<Job>> {
        RunLoopState::get_all_jobs(self)
    }

    fn wait_for_job(&self, job: &Arc<Job>, deadline: Deadline) -> bool {
        RunLoopState::wait_for_job(self, job, deadline)
    }

    fn wait_for_jobs(&self, predicate: &dyn Fn(&Job) -> bool, deadline: Deadline) -> bool {
        RunLoopState::wait_for_jobs(self, predicate, deadline)
    }

    fn wait_for_idle(&self, deadline: Deadline) -> bool {
        RunLoopState::wait_for_idle(self, deadline)
    }

    fn cancel_job(&self, id: JobId) -> bool {
        RunLoopState::cancel_job(self, id)
    }

    fn cancel_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> usize {
        RunLoopState::cancel_jobs(self, predicate)
    }

    fn cancel_pending_jobs(&self) -> usize {
        RunLoopState::cancel_pending_jobs(self)
    }

    fn cancel_running_jobs(&self) -> usize {
        RunLoopState::cancel_running_jobs(self)
    }

    fn cancel_all_jobs(&self) -> usize {
        RunLoopState::cancel_all_jobs(self)
    }

    fn get_stats(&self) -> Statistics {
        RunLoopState::get_stats(self)
    }

    fn reset_stats(&self) {
        RunLoopState::reset_stats(self)
    }
}

#[cfg(test)]
#[path = "runloop_tests.rs"]
mod tests;
