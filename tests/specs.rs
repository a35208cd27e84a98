// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios spanning whole crates: a job's cancellation wake-up
//! and FIFO ordering through a job queue, and a buffered file's commit,
//! abort, and crash-recovery behaviour together with the block allocator
//! built on top of it.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use keelwork_alloc::format::BlockFrame;
use keelwork_alloc::{AllocatorOptions, FileAllocator};
use keelwork_core::Deadline;
use keelwork_queue::JobQueue;
use keelwork_runloop::{Disposition, Execute, Fifo, Job, JobError, RunLoop};
use keelwork_storage::BufferedFile;

struct SleepsThenChecksShouldStop;
impl Execute for SleepsThenChecksShouldStop {
    fn execute(&mut self, should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if should_stop() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

#[test]
fn cancellation_wakes_a_sleeping_job() {
    let queue = JobQueue::new("cancel-wakeup", 1, Box::new(Fifo::new(None)));
    queue.start();

    let job = Arc::new(Job::new(SleepsThenChecksShouldStop));
    queue.enq(job.clone(), false, Deadline::Never).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    queue.cancel_job(job.id());

    let completed = queue.wait_for_job(&job, Deadline::after(Some(Duration::from_secs(1))));
    assert!(completed, "job should complete after cancellation");
    assert!(started.elapsed() < Duration::from_millis(200), "cancellation should wake the job promptly, took {:?}", started.elapsed());
    assert_eq!(job.disposition(), Disposition::Cancelled);

    queue.stop(false, false);
}

struct RecordsCompletion {
    index: usize,
    order: Arc<Mutex<Vec<usize>>>,
}
impl Execute for RecordsCompletion {
    fn execute(&mut self, _should_stop: &dyn Fn() -> bool) -> Result<(), JobError> {
        std::thread::sleep(Duration::from_millis(1));
        self.order.lock().unwrap().push(self.index);
        Ok(())
    }
}

#[test]
fn fifo_preserves_order_with_a_single_worker() {
    let queue = JobQueue::new("fifo-order", 1, Box::new(Fifo::new(None)));
    queue.start();

    let order = Arc::new(Mutex::new(Vec::new()));
    for index in 1..=10 {
        let job = Arc::new(Job::new(RecordsCompletion { index, order: order.clone() }));
        queue.enq(job, false, Deadline::Never).unwrap();
    }

    let idle = queue.wait_for_idle(Deadline::after(Some(Duration::from_secs(2))));
    assert!(idle, "queue should drain all ten jobs");
    queue.stop(false, false);

    assert_eq!(*order.lock().unwrap(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn commit_durability_survives_a_simulated_crash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.bin");

    {
        let file = BufferedFile::open(&path).unwrap();
        file.begin_transaction().unwrap();
        file.write_at(0, &[b'A'; 100]).unwrap();
        file.write_at(1_000_000, &[b'B'; 100]).unwrap();
        file.commit_transaction().unwrap();
        // `file` is dropped here with no explicit flush: the commit already
        // replayed into the backing file, so nothing further is owed to disk.
    }

    let reopened = BufferedFile::open(&path).unwrap();
    assert_eq!(reopened.read_at(0, 100).unwrap(), vec![b'A'; 100]);
    assert_eq!(reopened.read_at(1_000_000, 100).unwrap(), vec![b'B'; 100]);
    assert_eq!(reopened.read_at(500_000, 100).unwrap(), vec![0u8; 100]);
    assert_eq!(reopened.logical_size(), 1_000_100);
}

#[test]
fn abort_rolls_back_to_the_pre_transaction_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abortable.bin");

    let file = BufferedFile::open(&path).unwrap();
    file.begin_transaction().unwrap();
    file.write_at(0, &[b'X'; 100]).unwrap();
    file.commit_transaction().unwrap();

    file.begin_transaction().unwrap();
    file.write_at(0, &[b'Y'; 100]).unwrap();
    file.abort_transaction().unwrap();

    assert_eq!(file.read_at(0, 100).unwrap(), vec![b'X'; 100]);
}

#[test]
fn an_unclean_log_is_discarded_and_the_file_is_left_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash-mid-commit.bin");
    let log_path = keelwork_storage::wal::log_path_for(&path);

    {
        let file = BufferedFile::open(&path).unwrap();
        file.begin_transaction().unwrap();
        file.write_at(0, &[b'Z'; 100]).unwrap();
        // Flushing while a transaction is open writes the side log with
        // `is_clean = false` but never flips it: this is the crash point,
        // before `commit_transaction` would mark it clean and replay.
        file.flush().unwrap();
        assert!(log_path.exists());
    }

    let reopened = BufferedFile::open(&path).unwrap();
    assert!(!log_path.exists(), "recovery should delete the unclean log");
    assert_eq!(reopened.logical_size(), 0);
    assert_eq!(reopened.read_at(0, 100).unwrap(), vec![0u8; 100]);
}

#[test]
fn allocator_coalesces_freed_neighbours_into_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heap.bin");
    let file = BufferedFile::open(&path).unwrap();
    let allocator = FileAllocator::open(file, AllocatorOptions::default()).unwrap();

    let a = allocator.alloc(100).unwrap();
    let b = allocator.alloc(100).unwrap();
    let c = allocator.alloc(100).unwrap();
    allocator.free(b).unwrap();
    allocator.free(a).unwrap();

    // c is untouched by the merge of its left-hand neighbours.
    let found = allocator.free_block_at_least(1).unwrap();
    let frame_len = BlockFrame::frame_len(true); // default AllocatorOptions uses magic_frames = true
    assert_eq!(found, Some((200 + frame_len, a)));

    allocator.file().write_at(c, b"ok").unwrap();
    assert_eq!(allocator.file().read_at(c, 2).unwrap(), b"ok");
}
