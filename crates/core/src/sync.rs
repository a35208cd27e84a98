// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waitable events matching Windows `Event` reset semantics.
//!
//! A manual-reset event stays signaled until explicitly reset; any number of
//! waiters wake on a single `signal()`. An auto-reset event releases exactly
//! one waiter per `signal()` and clears itself in the act of releasing that
//! waiter. Both are built on `parking_lot::{Mutex, Condvar}` rather than a
//! raw OS event handle — the uniform contract the core run-loop needs.

use crate::deadline::Deadline;
use parking_lot::{Condvar, Mutex};

/// Stays signaled across any number of waiters until [`ManualResetEvent::reset`].
pub struct ManualResetEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl ManualResetEvent {
    pub fn new(signaled: bool) -> Self {
        Self { signaled: Mutex::new(signaled), cond: Condvar::new() }
    }

    pub fn signal(&self) {
        let mut guard = self.signaled.lock();
        *guard = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Block until signaled or `deadline` passes. Returns `true` if signaled.
    pub fn wait(&self, deadline: Deadline) -> bool {
        let mut guard = self.signaled.lock();
        loop {
            if *guard {
                return true;
            }
            match deadline {
                Deadline::Never => self.cond.wait(&mut guard),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else { return false };
                    if self.cond.wait_for(&mut guard, remaining).timed_out() && !*guard {
                        return false;
                    }
                }
            }
        }
    }
}

/// Releases exactly one waiter per `signal()`, auto-clearing on release.
pub struct AutoResetEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl AutoResetEvent {
    pub fn new(signaled: bool) -> Self {
        Self { signaled: Mutex::new(signaled), cond: Condvar::new() }
    }

    pub fn signal(&self) {
        let mut guard = self.signaled.lock();
        *guard = true;
        self.cond.notify_one();
    }

    /// Block until signaled or `deadline` passes. Consumes the signal on success.
    pub fn wait(&self, deadline: Deadline) -> bool {
        let mut guard = self.signaled.lock();
        loop {
            if *guard {
                *guard = false;
                return true;
            }
            match deadline {
                Deadline::Never => self.cond.wait(&mut guard),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else { return false };
                    let result = self.cond.wait_for(&mut guard, remaining);
                    if result.timed_out() && !*guard {
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
