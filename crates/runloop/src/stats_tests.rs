// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobId;
use std::time::Duration;

#[test]
fn record_accumulates_totals() {
    let mut stats = Statistics::new();
    let start = Instant::now();
    stats.record(JobId::new(), start, start + Duration::from_millis(10));
    stats.record(JobId::new(), start, start + Duration::from_millis(30));
    assert_eq!(stats.total_jobs, 2);
    assert_eq!(stats.total_job_time, Duration::from_millis(40));
}

#[test]
fn min_and_max_track_the_extremes() {
    let mut stats = Statistics::new();
    let start = Instant::now();
    stats.record(JobId::new(), start, start + Duration::from_millis(20));
    stats.record(JobId::new(), start, start + Duration::from_millis(5));
    stats.record(JobId::new(), start, start + Duration::from_millis(50));
    assert_eq!(stats.min.unwrap().elapsed, Duration::from_millis(5));
    assert_eq!(stats.max.unwrap().elapsed, Duration::from_millis(50));
    assert_eq!(stats.last.unwrap().elapsed, Duration::from_millis(50));
}

#[test]
fn reset_clears_everything() {
    let mut stats = Statistics::new();
    let start = Instant::now();
    stats.record(JobId::new(), start, start + Duration::from_millis(10));
    stats.reset();
    assert_eq!(stats.total_jobs, 0);
    assert!(stats.last.is_none());
}
