// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A process-wide timer registry: schedule a callback to run once a
//! deadline passes, addressed by an opaque [`TimerToken`] so it can be
//! cancelled before it fires.
//!
//! One background thread services every scheduled callback, sleeping until
//! the nearest deadline and waking early whenever a nearer one is added or
//! the current nearest is cancelled. Cancellation is lazy: a cancelled
//! token is recorded in a set and skipped when its turn comes up, rather
//! than walking the heap to remove it.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

struct ScheduledEntry {
    deadline: Instant,
    token: TimerToken,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.token == other.token
    }
}
impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline first.
        other.deadline.cmp(&self.deadline)
    }
}

type Callback = Box<dyn FnOnce() + Send>;

struct State {
    heap: BinaryHeap<ScheduledEntry>,
    callbacks: HashMap<u64, Callback>,
    cancelled: HashSet<u64>,
}

struct Registry {
    state: Mutex<State>,
    wake: Condvar,
    next_token: AtomicU64,
}

impl Registry {
    fn new() -> Arc<Self> {
        let registry = Arc::new(Registry {
            state: Mutex::new(State { heap: BinaryHeap::new(), callbacks: HashMap::new(), cancelled: HashSet::new() }),
            wake: Condvar::new(),
            next_token: AtomicU64::new(1),
        });
        let dispatcher = registry.clone();
        let spawned = std::thread::Builder::new().name("timer-dispatch".into()).spawn(move || dispatcher.run());
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn timer dispatch thread; scheduled timers will never fire");
        }
        registry
    }

    fn schedule(self: &Arc<Self>, deadline: Instant, callback: Callback) -> TimerToken {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        let token = TimerToken(id);
        let mut state = self.state.lock();
        state.callbacks.insert(id, callback);
        state.heap.push(ScheduledEntry { deadline, token });
        drop(state);
        self.wake.notify_one();
        token
    }

    /// Returns `true` if the timer was still pending and is now cancelled.
    /// Returns `false` if it had already fired (or never existed).
    fn cancel(&self, token: TimerToken) -> bool {
        let mut state = self.state.lock();
        let existed = state.callbacks.remove(&token.0).is_some();
        if existed {
            state.cancelled.insert(token.0);
        }
        existed
    }

    fn run(self: Arc<Self>) {
        loop {
            let mut state = self.state.lock();
            let popped = loop {
                match state.heap.peek() {
                    None => {
                        self.wake.wait(&mut state);
                    }
                    Some(peeked) => {
                        let now = Instant::now();
                        if peeked.deadline <= now {
                            break state.heap.pop();
                        }
                        self.wake.wait_for(&mut state, peeked.deadline - now);
                    }
                }
            };
            let Some(entry) = popped else {
                drop(state);
                continue;
            };
            let fired = state.cancelled.remove(&entry.token.0);
            let callback = state.callbacks.remove(&entry.token.0);
            drop(state);
            if !fired {
                if let Some(callback) = callback {
                    callback();
                }
            }
        }
    }
}

fn global() -> &'static Arc<Registry> {
    static INSTANCE: OnceLock<Arc<Registry>> = OnceLock::new();
    INSTANCE.get_or_init(Registry::new)
}

/// A process-wide handle for scheduling and cancelling deadline callbacks.
///
/// There is one registry and one dispatch thread per process; this type is
/// a zero-sized handle onto it.
pub struct TimerRegistry;

impl TimerRegistry {
    pub fn schedule_at(deadline: Instant, callback: impl FnOnce() + Send + 'static) -> TimerToken {
        global().schedule(deadline, Box::new(callback))
    }

    pub fn schedule_after(delay: Duration, callback: impl FnOnce() + Send + 'static) -> TimerToken {
        Self::schedule_at(Instant::now() + delay, callback)
    }

    /// Returns `true` if cancellation beat the callback's firing.
    pub fn cancel(token: TimerToken) -> bool {
        global().cancel(token)
    }
}

/// An RAII handle on a single scheduled callback: cancels it on drop unless
/// [`Timer::disarm`] was called first.
pub struct Timer {
    token: Option<TimerToken>,
}

impl Timer {
    pub fn schedule_after(delay: Duration, callback: impl FnOnce() + Send + 'static) -> Self {
        Self { token: Some(TimerRegistry::schedule_after(delay, callback)) }
    }

    pub fn schedule_at(deadline: Instant, callback: impl FnOnce() + Send + 'static) -> Self {
        Self { token: Some(TimerRegistry::schedule_at(deadline, callback)) }
    }

    /// Release the timer without cancelling it, letting it fire on schedule.
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            TimerRegistry::cancel(token);
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
