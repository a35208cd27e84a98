// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A bounded pool of reusable, expensive-to-create elements (job queues,
//! pipelines) with RAII check-out/check-in.
//!
//! The pool tracks availability with a plain count rather than a second
//! intrusive list of borrowed elements: the [`Pooled`] guard each borrower
//! holds already is the record of "this one is borrowed" — a parallel list
//! would just restate that.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use keelwork_core::Deadline;
use parking_lot::{Condvar, Mutex};

use crate::error::Error;

struct Inner<T> {
    available: Vec<T>,
    borrowed: usize,
}

/// Bounds `min <= available+borrowed <= max` and recycles elements through
/// RAII guards returned by [`Pool::get`].
pub struct Pool<T> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    min: usize,
    max: usize,
    inner: Mutex<Inner<T>>,
    idle: Condvar,
}

impl<T: Send + 'static> Pool<T> {
    /// Build a pool pre-populated with `min` elements, capped at `max`.
    pub fn new(min: usize, max: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Arc<Self> {
        let max = max.max(min).max(1);
        let available = (0..min).map(|_| factory()).collect();
        Arc::new(Self {
            factory: Box::new(factory),
            min,
            max,
            inner: Mutex::new(Inner { available, borrowed: 0 }),
            idle: Condvar::new(),
        })
    }

    /// Acquire an available element, or lazily create one if the pool
    /// hasn't reached `max`. Fails if the pool is exhausted.
    pub fn get(self: &Arc<Self>) -> Result<Pooled<T>, Error> {
        let mut inner = self.inner.lock();
        let value = match inner.available.pop() {
            Some(value) => value,
            None if inner.available.len() + inner.borrowed < self.max => (self.factory)(),
            None => return Err(Error::PoolExhausted { max: self.max }),
        };
        inner.borrowed += 1;
        Ok(Pooled { value: Some(value), pool: self.clone() })
    }

    pub fn available_count(&self) -> usize {
        self.inner.lock().available.len()
    }

    pub fn borrowed_count(&self) -> usize {
        self.inner.lock().borrowed
    }

    /// Block until no element is checked out, or `deadline` passes.
    pub fn wait_for_idle(&self, deadline: Deadline) -> bool {
        let mut inner = self.inner.lock();
        loop {
            if inner.borrowed == 0 {
                return true;
            }
            match deadline {
                Deadline::Never => self.idle.wait(&mut inner),
                Deadline::At(_) => {
                    let Some(remaining) = deadline.remaining() else { return inner.borrowed == 0 };
                    if self.idle.wait_for(&mut inner, remaining).timed_out() {
                        return inner.borrowed == 0;
                    }
                }
            }
        }
    }

    fn release(&self, value: T) {
        let mut inner = self.inner.lock();
        inner.borrowed -= 1;
        let total_alive = inner.available.len() + inner.borrowed + 1;
        if total_alive <= self.min {
            inner.available.push(value);
        }
        let idle = inner.borrowed == 0;
        drop(inner);
        if idle {
            self.idle.notify_all();
        }
    }
}

/// A checked-out pool element. Returns itself to the pool on drop (subject
/// to the pool's `min`/`max` bounds) rather than forcing explicit check-in.
pub struct Pooled<T: Send + 'static> {
    value: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Send + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("Pooled value is only taken on drop"),
        }
    }
}

impl<T: Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("Pooled value is only taken on drop"),
        }
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
