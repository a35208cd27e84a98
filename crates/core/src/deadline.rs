// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relative-interval deadlines, converted once to an absolute [`Instant`].
//!
//! Public wait APIs across the workspace take a relative `Duration` (or
//! `None` for "wait forever") rather than an absolute wall-clock time.
//! [`Deadline::after`] performs the one-time conversion to an absolute
//! instant so repeated `Condvar::wait_until` calls don't drift.

use std::time::{Duration, Instant};

/// An absolute point in time (or "never"), derived from a relative duration.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    Never,
    At(Instant),
}

impl Deadline {
    /// Build a deadline `timeout` from now, or [`Deadline::Never`] if `timeout` is `None`.
    pub fn after(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(d) => Deadline::At(Instant::now() + d),
            None => Deadline::Never,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Deadline::At(at) if Instant::now() >= *at)
    }

    /// Remaining time until the deadline, or `None` if it never expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Deadline::Never => None,
            Deadline::At(at) => Some(at.saturating_duration_since(Instant::now())),
        }
    }
}

#[cfg(test)]
#[path = "deadline_tests.rs"]
mod tests;
