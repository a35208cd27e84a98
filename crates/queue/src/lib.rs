// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-thread job queues, pipelines, and the pools that hold them.

pub mod error;
pub mod job_queue;
pub mod pipeline;
pub mod pool;
pub mod worker_pool;

pub use error::{Error, Result};
pub use job_queue::{JobQueue, WorkerHooks};
pub use pipeline::{Pipeline, PipelineExecute};
pub use pool::{Pool, Pooled};
pub use worker_pool::WorkerPool;
