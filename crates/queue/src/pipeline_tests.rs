// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use super::*;
use keelwork_runloop::Fifo;

fn stage_queue(name: &str) -> Arc<JobQueue> {
    JobQueue::new(name, 1, Box::new(Fifo::new(None)))
}

struct RecordsStages {
    seen: Arc<StdMutex<Vec<usize>>>,
    begins: Arc<AtomicUsize>,
    ends: Arc<AtomicUsize>,
}

impl PipelineExecute for RecordsStages {
    fn begin(&mut self) {
        self.begins.fetch_add(1, Ordering::SeqCst);
    }

    fn execute_stage(&mut self, stage: usize, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        self.seen.lock().unwrap().push(stage);
        Ok(())
    }

    fn end(&mut self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn job_flows_through_every_stage_in_order() {
    let stages = vec![stage_queue("p-stage"), stage_queue("p-stage"), stage_queue("p-stage")];
    for stage in &stages {
        stage.start();
    }
    let pipeline = Pipeline::new("three-stage", stages);

    let seen = Arc::new(StdMutex::new(Vec::new()));
    let begins = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));
    let execute = RecordsStages { seen: seen.clone(), begins: begins.clone(), ends: ends.clone() };

    let ok = pipeline.enq(Box::new(execute), true, Deadline::after(Some(Duration::from_secs(5))));
    assert!(ok);
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(begins.load(Ordering::SeqCst), 1);
    assert_eq!(ends.load(Ordering::SeqCst), 1);

    pipeline.stop(false, false);
}

struct CancelsAtFirstStage {
    job: Arc<Mutex<Option<Arc<Job>>>>,
}

impl PipelineExecute for CancelsAtFirstStage {
    fn execute_stage(&mut self, stage: usize, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        if stage == 0 {
            if let Some(job) = self.job.lock().clone() {
                job.cancel();
            }
        }
        Ok(())
    }
}

#[test]
fn cancellation_mid_pipeline_stops_stage_advancement() {
    let stages = vec![stage_queue("cancel-stage"), stage_queue("cancel-stage")];
    for stage in &stages {
        stage.start();
    }
    let pipeline = Pipeline::new("cancel-pipeline", stages);

    let job_slot: Arc<Mutex<Option<Arc<Job>>>> = Arc::new(Mutex::new(None));
    let execute = CancelsAtFirstStage { job: job_slot.clone() };

    // Enqueue without waiting so we can grab the pipeline-tracked job and
    // have stage 0 cancel it mid-execution.
    let running_before = pipeline.get_running_jobs();
    assert!(running_before.is_empty());

    assert!(pipeline.enq(Box::new(execute), false, Deadline::Never));
    // Give the relay thread a moment to register the job, then hand its
    // handle to the executing stage via job_slot so it can cancel itself.
    std::thread::sleep(Duration::from_millis(20));
    if let Some(job) = pipeline.get_running_jobs().into_iter().next() {
        *job_slot.lock() = Some(job);
    }

    assert!(pipeline.wait_for_idle(Deadline::after(Some(Duration::from_secs(5)))));
    pipeline.stop(false, false);
}

#[test]
fn wait_for_idle_returns_once_the_pipeline_has_no_running_jobs() {
    let stages = vec![stage_queue("idle-stage")];
    for stage in &stages {
        stage.start();
    }
    let pipeline = Pipeline::new("idle-pipeline", stages);
    assert!(pipeline.wait_for_idle(Deadline::after(Some(Duration::from_secs(1)))));

    struct NoOp;
    impl PipelineExecute for NoOp {
        fn execute_stage(&mut self, _stage: usize, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
            Ok(())
        }
    }
    assert!(pipeline.enq(Box::new(NoOp), true, Deadline::after(Some(Duration::from_secs(5)))));
    assert!(pipeline.wait_for_idle(Deadline::after(Some(Duration::from_secs(1)))));

    pipeline.stop(false, false);
}

#[test]
fn cancel_all_jobs_cancels_every_in_flight_job() {
    struct SleepsForever;
    impl PipelineExecute for SleepsForever {
        fn execute_stage(&mut self, _stage: usize, should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
            while !should_stop() {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        }
    }

    let stages = vec![stage_queue("cancel-all-stage")];
    for stage in &stages {
        stage.start();
    }
    let pipeline = Pipeline::new("cancel-all-pipeline", stages);
    assert!(pipeline.enq(Box::new(SleepsForever), false, Deadline::Never));
    std::thread::sleep(Duration::from_millis(20));

    let cancelled = pipeline.cancel_all_jobs();
    assert_eq!(cancelled, 1);
    assert!(pipeline.wait_for_idle(Deadline::after(Some(Duration::from_secs(5)))));

    pipeline.stop(false, false);
}
