// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An ordered sequence of job queues a job is passed through stage by stage.
//!
//! A single [`Job`] is reused across every stage: completing at stage `k`
//! resets it (via the normal `enq` path) and re-submits it to stage `k+1`'s
//! queue. A lightweight relay thread per in-flight job drives that handoff,
//! since nothing else observes "this run-loop's job just finished" from
//! outside the run-loop itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use keelwork_core::thread::{NamedThread, Priority};
use keelwork_core::{Deadline, ManualResetEvent};
use keelwork_runloop::{Disposition, Execute, Job, JobError, JobId, RunLoop, RunLoopId, Statistics};
use parking_lot::{Condvar, Mutex};

use crate::job_queue::JobQueue;

/// User work that runs once per pipeline stage.
///
/// `begin` fires once before stage 0's `execute_stage`; `end` fires once
/// after the last stage's, distinct from each stage's own prologue/epilogue.
pub trait PipelineExecute: Send {
    fn begin(&mut self) {}

    fn execute_stage(&mut self, stage: usize, should_stop: &dyn Fn() -> bool) -> Result<(), JobError>;

    fn end(&mut self) {}
}

struct StageAdapter {
    user: Box<dyn PipelineExecute>,
    stage: Arc<AtomicUsize>,
    num_stages: usize,
    began: AtomicBool,
}

impl Execute for StageAdapter {
    fn prologue(&mut self, _should_stop: &dyn Fn() -> bool) {
        if self.stage.load(Ordering::SeqCst) == 0 && !self.began.swap(true, Ordering::SeqCst) {
            self.user.begin();
        }
    }

    fn execute(&mut self, should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        self.user.execute_stage(self.stage.load(Ordering::SeqCst), should_stop)
    }

    fn epilogue(&mut self, _should_stop: &dyn Fn() -> bool) {
        if self.stage.load(Ordering::SeqCst) + 1 >= self.num_stages {
            self.user.end();
        }
    }
}

struct PipelineEntry {
    job: Arc<Job>,
    stage: Arc<AtomicUsize>,
    enqueued_at: Instant,
    /// Fires once the job has passed its last stage (or was abandoned) —
    /// distinct from `job`'s own per-stage completion signal, which fires
    /// and resets once per stage.
    pipeline_completed: ManualResetEvent,
}

struct Inner {
    running: HashMap<JobId, Arc<PipelineEntry>>,
    stats: Statistics,
}

/// A pipeline: an ordered sequence of stage queues plus its own running list.
pub struct Pipeline {
    id: RunLoopId,
    name: String,
    stages: Vec<Arc<JobQueue>>,
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Arc<JobQueue>>) -> Arc<Self> {
        Arc::new(Self {
            id: RunLoopId::new(),
            name: name.into(),
            stages,
            inner: Mutex::new(Inner { running: HashMap::new(), stats: Statistics::new() }),
            idle: Condvar::new(),
        })
    }

    pub fn id(&self) -> RunLoopId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn start(&self) {
        for stage in &self.stages {
            stage.start();
        }
    }

    pub fn stop(&self, cancel_running: bool, cancel_pending: bool) {
        for stage in &self.stages {
            stage.stop(cancel_running, cancel_pending);
        }
    }

    /// Enqueue `execute` on stage 0. If `wait`, blocks until the job has
    /// passed (or been abandoned at) the last stage.
    pub fn enq(self: &Arc<Self>, execute: Box<dyn PipelineExecute>, wait: bool, deadline: Deadline) -> bool {
        let Some(first_stage) = self.stages.first() else { return false };
        let stage = Arc::new(AtomicUsize::new(0));
        let adapter = StageAdapter { user: execute, stage: stage.clone(), num_stages: self.stages.len(), began: AtomicBool::new(false) };
        let job = Arc::new(Job::new(adapter));
        let entry = Arc::new(PipelineEntry {
            job: job.clone(),
            stage: stage.clone(),
            enqueued_at: Instant::now(),
            pipeline_completed: ManualResetEvent::new(false),
        });
        self.inner.lock().running.insert(job.id(), entry.clone());

        let pipeline = self.clone();
        let thread_name = format!("{}-relay", self.name);
        match NamedThread::spawn(thread_name.clone(), Priority::Normal, move || pipeline.relay(entry)) {
            Ok(thread) => thread.detach(),
            Err(err) => {
                tracing::error!(error = %err, pipeline = %thread_name, "failed to spawn pipeline relay thread");
                self.inner.lock().running.remove(&job.id());
                return false;
            }
        }

        let job_id = job.id();
        match first_stage.enq(job, false, Deadline::Never) {
            Ok(_) => {
                if wait {
                    self.wait_for_job_id(job_id, deadline)
                } else {
                    true
                }
            }
            Err(_) => false,
        }
    }

    /// Relay loop run by a dedicated thread per in-flight job: wait for the
    /// current stage to finish, then advance to the next or finish up.
    fn relay(self: Arc<Self>, entry: Arc<PipelineEntry>) {
        loop {
            entry.job.wait(Deadline::Never);
            let cancelled_or_failed = matches!(entry.job.disposition(), Disposition::Cancelled | Disposition::Failed);
            let current = entry.stage.load(Ordering::SeqCst);
            if cancelled_or_failed || current + 1 >= self.stages.len() {
                self.finish(&entry);
                return;
            }
            let next = current + 1;
            entry.stage.store(next, Ordering::SeqCst);
            if self.stages[next].enq(entry.job.clone(), false, Deadline::Never).is_err() {
                self.finish(&entry);
                return;
            }
        }
    }

    fn finish(&self, entry: &Arc<PipelineEntry>) {
        let elapsed = entry.enqueued_at.elapsed();
        let mut inner = self.inner.lock();
        inner.running.remove(&entry.job.id());
        inner.stats.record(entry.job.id(), entry.enqueued_at, entry.enqueued_at + elapsed);
        let idle = inner.running.is_empty();
        drop(inner);
        entry.pipeline_completed.signal();
        if idle {
            self.idle.notify_all();
        }
    }

    pub fn get_job(&self, id: JobId) -> Option<Arc<Job>> {
        self.inner.lock().running.get(&id).map(|entry| entry.job.clone())
    }

    pub fn get_running_jobs(&self) -> Vec<Arc<Job>> {
        self.inner.lock().running.values().map(|entry| entry.job.clone()).collect()
    }

    /// Block until `id` passes its last pipeline stage (or is abandoned), or
    /// `deadline` passes. A job no longer tracked is treated as already done.
    pub fn wait_for_job_id(&self, id: JobId, deadline: Deadline) -> bool {
        let entry = self.inner.lock().running.get(&id).cloned();
        match entry {
            Some(entry) => entry.pipeline_completed.wait(deadline),
            None => true,
        }
    }

    pub fn wait_for_idle(&self, deadline: Deadline) -> bool {
        let mut inner = self.inner.lock();
        loop {
            if inner.running.is_empty() {
                return true;
            }
            match deadline {
                Deadline::Never => self.idle.wait(&mut inner),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else { return inner.running.is_empty() };
                    if self.idle.wait_for(&mut inner, remaining).timed_out() {
                        return inner.running.is_empty();
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

    pub fn cancel_all_jobs(&self) -> usize {
        let jobs = self.get_running_jobs();
        for job in &jobs {
            job.cancel();
        }
        jobs.len()
    }

    pub fn get_stats(&self) -> Statistics {
        self.inner.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.inner.lock().stats.reset();
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
