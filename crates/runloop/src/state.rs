// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state behind a run-loop handle: pending/running job lists, the
//! execution policy, statistics, and the three conditions workers and
//! callers coordinate on.
//!
//! Separated from the handle so worker threads (owned by `keelwork-queue`)
//! can keep this alive past the handle's own destruction.

use std::collections::HashMap;
use std::sync::Arc;

use keelwork_core::intrusive::Key;
use keelwork_core::Deadline;
use parking_lot::{Condvar, Mutex};

use crate::job::{Disposition, Job, JobId, RunLoopId};
use crate::policy::{JobExecutionPolicy, JobSlab, PENDING, RUNNING};
use crate::stats::Statistics;
use crate::{Error, Result};

struct Inner {
    jobs: JobSlab,
    running_keys: HashMap<JobId, Key>,
    started: bool,
    terminating: bool,
    paused: bool,
    stats: Statistics,
}

pub struct RunLoopState {
    id: RunLoopId,
    name: String,
    policy: Box<dyn JobExecutionPolicy>,
    inner: Mutex<Inner>,
    pending_non_empty: Condvar,
    idle: Condvar,
    running_empty: Condvar,
    not_paused: Condvar,
}

impl RunLoopState {
    pub fn new(name: impl Into<String>, policy: Box<dyn JobExecutionPolicy>) -> Self {
        Self {
            id: RunLoopId::new(),
            name: name.into(),
            policy,
            inner: Mutex::new(Inner {
                jobs: JobSlab::new(),
                running_keys: HashMap::new(),
                started: false,
                terminating: false,
                paused: false,
                stats: Statistics::new(),
            }),
            pending_non_empty: Condvar::new(),
            idle: Condvar::new(),
            running_empty: Condvar::new(),
            not_paused: Condvar::new(),
        }
    }

    pub fn id(&self) -> RunLoopId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) {
        self.inner.lock().started = true;
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub fn is_terminating(&self) -> bool {
        self.inner.lock().terminating
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Set the terminating flag; optionally cancel running jobs in place and
    /// drop pending jobs (marking them Completed+Cancelled without running
    /// them); wake every worker blocked on this state.
    pub fn stop(&self, cancel_running: bool, cancel_pending: bool) {
        {
            let mut inner = self.inner.lock();
            inner.terminating = true;
            if cancel_pending {
                while let Some(key) = inner.jobs.pop_front(PENDING) {
                    if let Some(job) = inner.jobs.remove(key) {
                        job.cancel();
                        job.force_complete();
                    }
                }
            }
            if cancel_running {
                let running: Vec<Key> = inner.jobs.iter(RUNNING).collect();
                for key in running {
                    if let Some(job) = inner.jobs.get(key) {
                        job.cancel();
                    }
                }
            }
        }
        self.pending_non_empty.notify_all();
        self.not_paused.notify_all();
        self.idle.notify_all();
    }

    /// Set the paused flag (optionally cancelling currently-running jobs),
    /// then block until no job is actively running or `deadline` passes.
    pub fn pause(&self, cancel_running: bool, deadline: Deadline) -> bool {
        let mut inner = self.inner.lock();
        inner.paused = true;
        if cancel_running {
            let running: Vec<Key> = inner.jobs.iter(RUNNING).collect();
            for key in running {
                if let Some(job) = inner.jobs.get(key) {
                    job.cancel();
                }
            }
        }
        loop {
            if inner.jobs.is_empty(RUNNING) {
                return true;
            }
            match deadline {
                Deadline::Never => self.running_empty.wait(&mut inner),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else { return inner.jobs.is_empty(RUNNING) };
                    let result = self.running_empty.wait_for(&mut inner, remaining);
                    if result.timed_out() {
                        return inner.jobs.is_empty(RUNNING);
                    }
                }
            }
        }
    }

    pub fn resume(&self) {
        self.inner.lock().paused = false;
        self.not_paused.notify_all();
    }

    pub fn enq(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool> {
        self.enq_impl(job, false, wait, deadline)
    }

    pub fn enq_front(&self, job: Arc<Job>, wait: bool, deadline: Deadline) -> Result<bool> {
        self.enq_impl(job, true, wait, deadline)
    }

    fn enq_impl(&self, job: Arc<Job>, front: bool, wait: bool, deadline: Deadline) -> Result<bool> {
        {
            let mut inner = self.inner.lock();
            if inner.terminating {
                return Err(Error::Stopped);
            }
            if let Some(max) = self.policy.max_jobs() {
                if inner.jobs.len(PENDING) >= max {
                    return Err(Error::Core(keelwork_core::Error::PoolExhausted { max }));
                }
            }
            job.reset_for_enqueue(self.id);
            let key = inner.jobs.insert(job.clone());
            if front {
                self.policy.enq_front(&mut inner.jobs, key);
            } else {
                self.policy.enq(&mut inner.jobs, key);
            }
        }
        self.pending_non_empty.notify_all();
        if wait {
            Ok(job.wait(deadline) && job.disposition() != Disposition::Cancelled)
        } else {
            Ok(true)
        }
    }

    /// Pop the next job off the pending queue and move it to running,
    /// blocking while the queue is empty or paused. Returns `None` once the
    /// run-loop is terminating. Jobs found already-cancelled while still
    /// pending are reaped here without ever being executed.
    pub fn next_job(&self) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.terminating {
                return None;
            }
            while inner.paused && !inner.terminating {
                self.not_paused.wait(&mut inner);
            }
            if inner.terminating {
                return None;
            }
            if inner.jobs.is_empty(PENDING) {
                self.pending_non_empty.wait(&mut inner);
                continue;
            }
            let Some(key) = self.policy.deq(&mut inner.jobs) else { continue };
            let Some(job) = inner.jobs.get(key).cloned() else { continue };
            if job.disposition() == Disposition::Cancelled {
                inner.jobs.remove(key);
                job.force_complete();
                if inner.jobs.is_empty(PENDING) && inner.jobs.is_empty(RUNNING) {
                    self.idle.notify_all();
                }
                continue;
            }
            inner.jobs.push_back(RUNNING, key);
            inner.running_keys.insert(job.id(), key);
            job.begin_running();
            return Some(job);
        }
    }

    /// Drive exactly one job to completion, blocking until one becomes
    /// available. Returns `false` once the run-loop is terminating and
    /// there is nothing left to run — the worker loop a thread-owning
    /// run-loop spawns is just `while state.run_one() {}`.
    pub fn run_one(&self) -> bool {
        let Some(job) = self.next_job() else { return false };
        job.run(&|| self.is_terminating());
        self.complete_job(&job);
        true
    }

    /// Remove a just-executed job from the running set and fold its timing
    /// into statistics. Called by the worker after `Job::run` returns.
    pub fn complete_job(&self, job: &Arc<Job>) {
        let mut inner = self.inner.lock();
        if let Some(key) = inner.running_keys.remove(&job.id()) {
            inner.jobs.remove(key);
        }
        if let (Some(start), Some(end)) = (job.created_at(), job.completed_at()) {
            inner.stats.record(job.id(), start, end);
        }
        let idle = inner.jobs.is_empty(PENDING) && inner.jobs.is_empty(RUNNING);
        let running_empty = inner.jobs.is_empty(RUNNING);
        drop(inner);
        if running_empty {
            self.running_empty.notify_all();
        }
        if idle {
            self.idle.notify_all();
        }
    }

    pub fn get_job(&self, id: JobId) -> Option<Arc<Job>> {
        let inner = self.inner.lock();
        for list in [PENDING, RUNNING] {
            for key in inner.jobs.iter(list) {
                if let Some(job) = inner.jobs.get(key) {
                    if job.id() == id {
                        return Some(job.clone());
                    }
                }
            }
        }
        None
    }

    pub fn get_jobs(&self, predicate: impl Fn(&Job) -> bool) -> Vec<Arc<Job>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for list in [PENDING, RUNNING] {
            for key in inner.jobs.iter(list) {
                if let Some(job) = inner.jobs.get(key) {
                    if predicate(job) {
                        out.push(job.clone());
                    }
                }
            }
        }
        out
    }

    fn list_jobs(&self, list: usize) -> Vec<Arc<Job>> {
        let inner = self.inner.lock();
        inner.jobs.iter(list).filter_map(|k| inner.jobs.get(k).cloned()).collect()
    }

    pub fn get_pending_jobs(&self) -> Vec<Arc<Job>> {
        self.list_jobs(PENDING)
    }

    pub fn get_running_jobs(&self) -> Vec<Arc<Job>> {
        self.list_jobs(RUNNING)
    }

    pub fn get_all_jobs(&self) -> Vec<Arc<Job>> {
        let mut jobs = self.list_jobs(PENDING);
        jobs.extend(self.list_jobs(RUNNING));
        jobs
    }

    pub fn wait_for_job(&self, job: &Arc<Job>, deadline: Deadline) -> bool {
        job.wait(deadline)
    }

    pub fn wait_for_job_id(&self, id: JobId, deadline: Deadline) -> bool {
        match self.get_job(id) {
            Some(job) => job.wait(deadline),
            None => true,
        }
    }

    pub fn wait_for_jobs(&self, predicate: impl Fn(&Job) -> bool, deadline: Deadline) -> bool {
        self.get_jobs(predicate).iter().all(|job| job.wait(deadline))
    }

    pub fn wait_for_idle(&self, deadline: Deadline) -> bool {
        let mut inner = self.inner.lock();
        loop {
            let done = (inner.jobs.is_empty(PENDING) && inner.jobs.is_empty(RUNNING)) || inner.paused;
            if done {
                return true;
            }
            match deadline {
                Deadline::Never => self.idle.wait(&mut inner),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else {
                        return (inner.jobs.is_empty(PENDING) && inner.jobs.is_empty(RUNNING)) || inner.paused;
                    };
                    let result = self.idle.wait_for(&mut inner, remaining);
                    if result.timed_out() {
                        return (inner.jobs.is_empty(PENDING) && inner.jobs.is_empty(RUNNING)) || inner.paused;
                    }
                }
            }
        }
    }

    pub fn cancel_job(&self, id: JobId) -> bool {
        match self.get_job(id) {
            Some(job) => {
                job.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_jobs(&self, predicate: impl Fn(&Job) -> bool) -> usize {
        let jobs = self.get_jobs(predicate);
        for job in &jobs {
            job.cancel();
        }
        jobs.len()
    }

    pub fn cancel_pending_jobs(&self) -> usize {
        let jobs = self.list_jobs(PENDING);
        for job in &jobs {
            job.cancel();
        }
        jobs.len()
    }

    pub fn cancel_running_jobs(&self) -> usize {
        let jobs = self.list_jobs(RUNNING);
        for job in &jobs {
            job.cancel();
        }
        jobs.len()
    }

    pub fn cancel_all_jobs(&self) -> usize {
        self.cancel_pending_jobs() + self.cancel_running_jobs()
    }

    pub fn get_stats(&self) -> Statistics {
        self.inner.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.inner.lock().stats.reset();
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
