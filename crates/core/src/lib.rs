// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keelwork-core: cross-platform concurrency and serialization substrate.
//!
//! Provides the primitives the rest of the workspace is built from: waitable
//! events, a named thread wrapper, a slab-backed intrusive list, a
//! token-addressed timer registry, an endian-aware serializer, and a
//! process-wide system-info singleton.

pub mod macros;

pub mod clock;
pub mod deadline;
pub mod error;
pub mod id;
pub mod intrusive;
pub mod serializer;
pub mod sync;
pub mod sysinfo;
pub mod thread;
pub mod timer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use deadline::Deadline;
pub use error::Error;
pub use id::{short, IdBuf, IdGen, SequentialIdGen, UuidIdGen};
pub use intrusive::MultiList;
pub use serializer::{Deserializer, Endianness, Serializer};
pub use sync::{AutoResetEvent, ManualResetEvent};
pub use sysinfo::SystemInfo;
pub use thread::NamedThread;
pub use timer::{Timer, TimerRegistry, TimerToken};
