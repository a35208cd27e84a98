// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A run-loop backed by a fixed-size pool of named worker threads.

use std::sync::Arc;

use keelwork_core::thread::{NamedThread, Priority};
use keelwork_core::Deadline;
use keelwork_runloop::{Job, JobExecutionPolicy, JobId, RunLoop, RunLoopId, RunLoopState, Statistics};
use parking_lot::Mutex;

/// Per-thread setup/teardown hooks a job queue calls around its worker loop.
///
/// Used to establish per-thread OS state (thread-local allocators, COM
/// apartments, signal masks) that has no other natural place to live.
pub trait WorkerHooks: Send + Sync {
    fn initialize_worker(&self) {}

    fn uninitialize_worker(&self) {}
}

struct NoopHooks;
impl WorkerHooks for NoopHooks {}

/// A run-loop with `N` worker threads, each named `<queue-name>-<k>`.
pub struct JobQueue {
    state: Arc<RunLoopState>,
    hooks: Arc<dyn WorkerHooks>,
    worker_count: usize,
    workers: Mutex<Vec<NamedThread<()>>>,
}

impl JobQueue {
    pub fn new(name: impl Into<String>, worker_count: usize, policy: Box<dyn JobExecutionPolicy>) -> Arc<Self> {
        Self::with_hooks(name, worker_count, policy, Arc::new(NoopHooks))
    }

    pub fn with_hooks(
        name: impl Into<String>,
        worker_count: usize,
        policy: Box<dyn JobExecutionPolicy>,
        hooks: Arc<dyn WorkerHooks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(RunLoopState::new(name, policy)),
            hooks,
            worker_count: worker_count.max(1),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub(crate) fn state(&self) -> &Arc<RunLoopState> {
        &self.state
    }
}

impl RunLoop for JobQueue {
    fn id(&self) -> RunLoopId {
        self.state.id()
    }

    fn name(&self) -> &str {
        self.state.name()
    }

    fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        self.state.start();
        for k in 0..self.worker_count {
            let thread_name = format!("{}-{}", self.state.name(), k);
            let state = self.state.clone();
            let hooks = self.hooks.clone();
            match NamedThread::spawn(thread_name.clone(), Priority::Normal, move || {
                hooks.initialize_worker();
                while state.run_one() {}
                hooks.uninitialize_worker();
            }) {
                Ok(thread) => workers.push(thread),
                Err(err) => {
                    tracing::error!(error = %err, worker = %thread_name, "failed to spawn job queue worker thread");
                }
            }
        }
    }

    fn stop(&self, cancel_running: bool, cancel_pending: bool) {
        self.state.stop(cancel_running, cancel_pending);
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            worker.join(None);
        }
    }

    fn pause(&self, cancel_running: bool, deadline: Deadline) -> bool {
        self.state.pause(cancel_running, deadline)
    }

    fn resume(&self) {
        self.state.resume()
    }

    fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    fn enq(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> keelwork_runloop::Result<bool> {
        self.state.enq(job, wait, deadline)
    }

    fn enq_front(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> keelwork_runloop::Result<bool> {
        self.state.enq_front(job, wait, deadline)
    }

    fn get_job(&self, id: JobId) -> Option<Arc<Job>> {
        self.state.get_job(id)
    }

    fn get_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> Vec<Arc<Job>> {
        self.state.get_jobs(predicate)
    }

    fn get_pending_jobs(&self) -> Vec<Arc<Job>> {
        self.state.get_pending_jobs()
    }

    fn get_running_jobs(&self) -> Vec<Arc<Job>> {
        self.state.get_running_jobs()
    }

    fn get_all_jobs(&self) -> Vec<Arc<Job>> {
        self.state.get_all_jobs()
    }

    fn wait_for_job(&self, job: &Arc<Job>, deadline: Deadline) -> bool {
        self.state.wait_for_job(job, deadline)
    }

    fn wait_for_jobs(&self, predicate: &dyn Fn(&Job) -> bool, deadline: Deadline) -> bool {
        self.state.wait_for_jobs(predicate, deadline)
    }

    fn wait_for_idle(&self, deadline: Deadline) -> bool {
        self.state.wait_for_idle(deadline)
    }

    fn cancel_job(&self, id: JobId) -> bool {
        self.state.cancel_job(id)
    }

    fn cancel_jobs(&self, predicate: &dyn Fn(&Job) -> bool) -> usize {
        self.state.cancel_jobs(predicate)
    }

    fn cancel_pending_jobs(&self) -> usize {
        self.state.cancel_pending_jobs()
    }

    fn cancel_running_jobs(&self) -> usize {
        self.state.cancel_running_jobs()
    }

    fn cancel_all_jobs(&self) -> usize {
        self.state.cancel_all_jobs()
    }

    fn get_stats(&self) -> Statistics {
        self.state.get_stats()
    }

    fn reset_stats(&self) {
        self.state.reset_stats()
    }
}

#[cfg(test)]
#[path = "job_queue_tests.rs"]
mod tests;
