// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::{Execute, Job, JobError, JobId};

struct Noop;
impl Execute for Noop {
    fn execute(&mut self, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        Ok(())
    }
}

fn job() -> Arc<Job> {
    Arc::new(Job::new(Noop))
}

fn ids(jobs: &JobSlab, keys: &[Key]) -> Vec<JobId> {
    keys.iter().map(|k| jobs.get(*k).unwrap().id()).collect()
}

#[test]
fn fifo_dequeues_in_enqueue_order() {
    let policy = Fifo::new(None);
    let mut slab: JobSlab = MultiList::new();
    let (a, b, c) = (job(), job(), job());
    let (ka, kb, kc) = (slab.insert(a.clone()), slab.insert(b.clone()), slab.insert(c.clone()));
    policy.enq(&mut slab, ka);
    policy.enq(&mut slab, kb);
    policy.enq(&mut slab, kc);

    let order: Vec<JobId> = [policy.deq(&mut slab), policy.deq(&mut slab), policy.deq(&mut slab)]
        .into_iter()
        .map(|k| slab.get(k.unwrap()).unwrap().id())
        .collect();
    assert_eq!(order, vec![a.id(), b.id(), c.id()]);
}

#[test]
fn fifo_enq_front_jumps_the_queue() {
    let policy = Fifo::new(None);
    let mut slab: JobSlab = MultiList::new();
    let (a, b) = (job(), job());
    let ka = slab.insert(a.clone());
    let kb = slab.insert(b.clone());
    policy.enq(&mut slab, ka);
    policy.enq_front(&mut slab, kb);
    assert_eq!(slab.get(policy.deq(&mut slab).unwrap()).unwrap().id(), b.id());
}

#[test]
fn lifo_dequeues_most_recently_enqueued_first() {
    let policy = Lifo::new(None);
    let mut slab: JobSlab = MultiList::new();
    let (a, b, c) = (job(), job(), job());
    let (ka, kb, kc) = (slab.insert(a.clone()), slab.insert(b.clone()), slab.insert(c.clone()));
    policy.enq(&mut slab, ka);
    policy.enq(&mut slab, kb);
    policy.enq(&mut slab, kc);

    let order = ids(&slab, &[policy.deq(&mut slab).unwrap(), policy.deq(&mut slab).unwrap(), policy.deq(&mut slab).unwrap()]);
    assert_eq!(order, vec![c.id(), b.id(), a.id()]);
}

#[test]
fn lifo_enq_front_goes_to_the_back() {
    let policy = Lifo::new(None);
    let mut slab: JobSlab = MultiList::new();
    let (a, b) = (job(), job());
    let ka = slab.insert(a.clone());
    let kb = slab.insert(b.clone());
    policy.enq(&mut slab, ka); // front
    policy.enq_front(&mut slab, kb); // back, per LIFO's enq_front contract
    assert_eq!(slab.get(policy.deq(&mut slab).unwrap()).unwrap().id(), a.id());
}

#[test]
fn max_jobs_is_carried_by_the_policy() {
    assert_eq!(Fifo::new(Some(8)).max_jobs(), Some(8));
    assert_eq!(Lifo::new(None).max_jobs(), None);
}
