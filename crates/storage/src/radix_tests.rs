// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_page_is_none() {
    let index = RadixIndex::new();
    assert!(index.get(0).is_none());
    assert!(index.get(10 * PAGE_SIZE as u64).is_none());
}

#[test]
fn get_or_insert_materializes_exactly_one_page() {
    let mut index = RadixIndex::new();
    let offset = 5 * PAGE_SIZE as u64 + 12;
    let buf = index.get_or_insert_with(offset, Buffer::new_zeroed);
    assert_eq!(buf.offset, 5 * PAGE_SIZE as u64);
    buf.len = 20;
    buf.dirty = true;

    let again = index.get(offset).unwrap();
    assert_eq!(again.len, 20);
    assert!(again.dirty);
}

#[test]
fn distinct_pages_do_not_collide() {
    let mut index = RadixIndex::new();
    index.get_or_insert_with(0, Buffer::new_zeroed).len = 5;
    index.get_or_insert_with(PAGE_SIZE as u64, Buffer::new_zeroed).len = 9;
    index.get_or_insert_with(1_000_000 * PAGE_SIZE as u64, Buffer::new_zeroed).len = 3;

    assert_eq!(index.get(0).unwrap().len, 5);
    assert_eq!(index.get(PAGE_SIZE as u64).unwrap().len, 9);
    assert_eq!(index.get(1_000_000 * PAGE_SIZE as u64).unwrap().len, 3);
}

#[test]
fn truncate_drops_pages_past_new_size_and_clips_the_straddler() {
    let mut index = RadixIndex::new();
    index.get_or_insert_with(0, Buffer::new_zeroed).len = PAGE_SIZE;
    index.get_or_insert_with(PAGE_SIZE as u64, Buffer::new_zeroed).len = PAGE_SIZE;

    let new_size = PAGE_SIZE as u64 + 10;
    index.truncate_to(new_size);

    assert_eq!(index.get(0).unwrap().len, PAGE_SIZE);
    let straddler = index.get(PAGE_SIZE as u64).unwrap();
    assert_eq!(straddler.len, 10);
    assert!(straddler.dirty);
}

#[test]
fn truncate_to_zero_drops_everything() {
    let mut index = RadixIndex::new();
    index.get_or_insert_with(0, Buffer::new_zeroed).len = 5;
    index.get_or_insert_with(PAGE_SIZE as u64, Buffer::new_zeroed).len = 5;
    index.truncate_to(0);
    assert!(index.get(0).is_none());
    assert!(index.get(PAGE_SIZE as u64).is_none());
}

#[test]
fn dirty_buffers_reports_only_dirty_pages() {
    let mut index = RadixIndex::new();
    index.get_or_insert_with(0, Buffer::new_zeroed).dirty = true;
    index.get_or_insert_with(PAGE_SIZE as u64, Buffer::new_zeroed); // left clean
    assert_eq!(index.dirty_buffers().len(), 1);

    index.clear_all_dirty();
    assert_eq!(index.dirty_buffers().len(), 0);
}

#[test]
fn last_touched_page_tracks_most_recent_access() {
    let mut index = RadixIndex::new();
    index.get_or_insert_with(3 * PAGE_SIZE as u64, Buffer::new_zeroed);
    assert_eq!(index.last_touched_page(), Some(3));
}
