// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pool of job queues themselves, each queue acting as one "worker".
//!
//! Unlike [`crate::pool::Pool`]'s usual clients (a single expensive
//! resource borrowed for the duration of one call), a checked-out
//! [`JobQueue`] here is handed a job and released immediately — the queue
//! keeps running the job on its own worker threads after the guard drops.

use std::sync::Arc;

use keelwork_core::Deadline;
use keelwork_runloop::{Job, JobExecutionPolicy, RunLoop};

use crate::job_queue::JobQueue;
use crate::pool::Pool;

/// A pool of [`JobQueue`]s, each built fresh by `queue_factory` and started
/// before being handed out.
pub struct WorkerPool {
    pool: Arc<Pool<Arc<JobQueue>>>,
}

impl WorkerPool {
    /// Build a pool of `min..=max` job queues, each with `workers_per_queue`
    /// threads and its own copy of `policy_factory`'s policy.
    pub fn new(
        name: impl Into<String>,
        min: usize,
        max: usize,
        workers_per_queue: usize,
        policy_factory: impl Fn() -> Box<dyn JobExecutionPolicy> + Send + Sync + 'static,
    ) -> Arc<Self> {
        let name = name.into();
        let mut next_id = 0usize;
        let pool = Pool::new(min, max, move || {
            let id = next_id;
            next_id += 1;
            let queue = JobQueue::new(format!("{name}-worker-{id}"), workers_per_queue, policy_factory());
            queue.start();
            queue
        });
        Arc::new(Self { pool })
    }

    pub fn available_count(&self) -> usize {
        self.pool.available_count()
    }

    pub fn borrowed_count(&self) -> usize {
        self.pool.borrowed_count()
    }

    /// Submit `job` to a pooled queue, waiting for it to run to completion
    /// if `wait`. Fails if every queue is checked out.
    pub fn dispatch(self: &Arc<Self>, job: Arc<Job>, wait: bool, deadline: Deadline) -> crate::Result<bool> {
        let queue = self.pool.get()?;
        Ok(queue.enq(job, wait, deadline)?)
    }

    /// Block until every checked-out queue has been returned.
    pub fn wait_for_idle(&self, deadline: Deadline) -> bool {
        self.pool.wait_for_idle(deadline)
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
