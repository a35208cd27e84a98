// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn schedule_after_fires_the_callback() {
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_cb = fired.clone();
    let _token = TimerRegistry::schedule_after(Duration::from_millis(10), move || {
        fired_in_cb.store(true, Ordering::SeqCst);
    });
    std::thread::sleep(Duration::from_millis(100));
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn cancel_before_firing_prevents_the_callback() {
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_cb = fired.clone();
    let token = TimerRegistry::schedule_after(Duration::from_millis(50), move || {
        fired_in_cb.store(true, Ordering::SeqCst);
    });
    assert!(TimerRegistry::cancel(token));
    std::thread::sleep(Duration::from_millis(100));
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn cancel_after_firing_returns_false() {
    let token = TimerRegistry::schedule_after(Duration::from_millis(5), || {});
    std::thread::sleep(Duration::from_millis(100));
    assert!(!TimerRegistry::cancel(token));
}

#[test]
fn timer_guard_cancels_on_drop() {
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_cb = fired.clone();
    {
        let _timer = Timer::schedule_after(Duration::from_millis(50), move || {
            fired_in_cb.store(true, Ordering::SeqCst);
        });
    }
    std::thread::sleep(Duration::from_millis(100));
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn disarmed_timer_guard_still_fires() {
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_cb = fired.clone();
    let timer = Timer::schedule_after(Duration::from_millis(10), move || {
        fired_in_cb.store(true, Ordering::SeqCst);
    });
    timer.disarm();
    std::thread::sleep(Duration::from_millis(100));
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn earlier_timer_scheduled_after_a_later_one_still_fires_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let order_late = order.clone();
    let order_early = order.clone();
    let _late = TimerRegistry::schedule_after(Duration::from_millis(80), move || {
        order_late.lock().push("late");
    });
    let _early = TimerRegistry::schedule_after(Duration::from_millis(20), move || {
        order_early.lock().push("early");
    });
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(*order.lock(), vec!["early", "late"]);
}
