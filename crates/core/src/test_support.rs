// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for this crate's own tests and for downstream crates that
//! enable the `test-support` feature to test against deterministic
//! clocks/ids instead of wall-clock time and random UUIDs.

use std::sync::Once;

use crate::clock::FakeClock;
use crate::id::SequentialIdGen;

/// Installs a `tracing` subscriber that writes to the test harness's
/// captured stdout, honoring `RUST_LOG`. Safe to call from every test;
/// only the first call takes effect.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
    });
}

/// A fresh [`FakeClock`] pinned to `Instant::now()`/epoch-0, for tests that
/// need to control time without sleeping.
pub fn fake_clock() -> FakeClock {
    FakeClock::new()
}

/// A [`SequentialIdGen`] producing `{prefix}-1`, `{prefix}-2`, ... so
/// assertions can pin exact ids instead of matching on a UUID shape.
pub fn deterministic_ids(prefix: &str) -> SequentialIdGen {
    SequentialIdGen::new(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdGen;

    #[test]
    fn deterministic_ids_increment_from_one() {
        let gen = deterministic_ids("job");
        assert_eq!(gen.next(), "job-1");
        assert_eq!(gen.next(), "job-2");
    }

    #[test]
    fn fake_clock_does_not_advance_on_its_own() {
        use crate::clock::Clock;
        let clock = fake_clock();
        let t0 = clock.now();
        let t1 = clock.now();
        assert_eq!(t0, t1);
    }
}
