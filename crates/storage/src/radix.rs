// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five-level sparse radix index over a buffered file's page cache.
//!
//! Keyed by page index (byte offset / [`PAGE_SIZE`]), not raw offset: the
//! top four levels are internal nodes consuming one byte each of the page
//! index's low 40 bits, the fifth level is a segment mapping its last byte
//! to a cached [`Buffer`]. Missing nodes are never allocated — indexing a
//! page that was never touched creates nothing until a write or a
//! materializing read reaches it.

use std::collections::BTreeMap;

/// Fixed leaf page size. The source left this as a build-time knob; 4 KiB
/// keeps the cache friendly to typical filesystem block sizes without
/// pulling whole large buffers into memory for small reads.
pub const PAGE_SIZE: usize = 4096;

/// One cached page of the file.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub offset: u64,
    pub len: usize,
    pub dirty: bool,
    pub bytes: Vec<u8>,
}

impl Buffer {
    pub fn new_zeroed(offset: u64) -> Self {
        Self { offset, len: 0, dirty: false, bytes: vec![0u8; PAGE_SIZE] }
    }
}

enum Node {
    Internal(BTreeMap<u8, Node>),
    Segment(BTreeMap<u8, Buffer>),
}

impl Node {
    fn is_empty(&self) -> bool {
        match self {
            Node::Internal(m) => m.is_empty(),
            Node::Segment(m) => m.is_empty(),
        }
    }
}

/// The page-indexed radix tree plus a one-entry most-recently-used marker.
///
/// The marker only records which page was touched last; it does not bypass
/// the tree descent (that would need an unsafe back-reference into the
/// segment map). It exists so callers like statistics or debug tooling can
/// ask "what page did we just touch" without re-deriving it from the offset.
pub struct RadixIndex {
    root: BTreeMap<u8, Node>,
    last_touched_page: Option<u64>,
}

fn path_for(page_index: u64) -> [u8; 5] {
    let bytes = page_index.to_be_bytes();
    [bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

fn page_offset(offset: u64) -> u64 {
    offset / PAGE_SIZE as u64
}

impl RadixIndex {
    pub fn new() -> Self {
        Self { root: BTreeMap::new(), last_touched_page: None }
    }

    pub fn last_touched_page(&self) -> Option<u64> {
        self.last_touched_page
    }

    /// Look up the buffer covering `offset`, if present.
    pub fn get(&self, offset: u64) -> Option<&Buffer> {
        let path = path_for(page_offset(offset));
        let mut node = self.root.get(&path[0])?;
        for byte in &path[1..4] {
            node = match node {
                Node::Internal(m) => m.get(byte)?,
                Node::Segment(_) => unreachable!("internal levels exhausted before segment"),
            };
        }
        match node {
            Node::Segment(seg) => seg.get(&path[4]),
            Node::Internal(_) => unreachable!("segment expected at depth 4"),
        }
    }

    /// Look up the buffer covering `offset`, materializing it with
    /// `create` if absent.
    pub fn get_or_insert_with(&mut self, offset: u64, create: impl FnOnce(u64) -> Buffer) -> &mut Buffer {
        let page_index = page_offset(offset);
        let path = path_for(page_index);
        self.last_touched_page = Some(page_index);

        let mut map = &mut self.root;
        for level in 0..3 {
            let child = map
                .entry(path[level])
                .or_insert_with(|| Node::Internal(BTreeMap::new()));
            map = match child {
                Node::Internal(m) => m,
                Node::Segment(_) => unreachable!("internal level already holds a segment"),
            };
        }
        let segment = map
            .entry(path[3])
            .or_insert_with(|| Node::Segment(BTreeMap::new()));
        let seg_map = match segment {
            Node::Segment(m) => m,
            Node::Internal(_) => unreachable!("segment level already holds an internal node"),
        };
        let page_start = page_index * PAGE_SIZE as u64;
        seg_map.entry(path[4]).or_insert_with(|| create(page_start))
    }

    /// Drop every buffer whose offset is `>= new_size`, and truncate any
    /// buffer straddling `new_size` down to it.
    pub fn truncate_to(&mut self, new_size: u64) {
        self.last_touched_page = None;
        Self::truncate_node(&mut self.root, new_size);
    }

    fn truncate_node(map: &mut BTreeMap<u8, Node>, new_size: u64) {
        map.retain(|_, node| {
            match node {
                Node::Internal(inner) => Self::truncate_node(inner, new_size),
                Node::Segment(seg) => {
                    seg.retain(|_, buf| {
                        if buf.offset >= new_size {
                            false
                        } else {
                            if buf.offset + buf.len as u64 > new_size {
                                buf.len = (new_size - buf.offset) as usize;
                                buf.dirty = true;
                            }
                            true
                        }
                    });
                }
            }
            !node.is_empty()
        });
    }

    /// Visit every dirty buffer, in page order.
    pub fn dirty_buffers(&self) -> Vec<&Buffer> {
        let mut out = Vec::new();
        Self::collect_dirty(&self.root, &mut out);
        out
    }

    fn collect_dirty<'a>(map: &'a BTreeMap<u8, Node>, out: &mut Vec<&'a Buffer>) {
        for node in map.values() {
            match node {
                Node::Internal(inner) => Self::collect_dirty(inner, out),
                Node::Segment(seg) => out.extend(seg.values().filter(|b| b.dirty)),
            }
        }
    }

    /// Clear the dirty bit on every buffer (used after a flush writes them
    /// all out, whether to the backing file or the transaction log).
    pub fn clear_all_dirty(&mut self) {
        Self::clear_dirty_node(&mut self.root);
    }

    fn clear_dirty_node(map: &mut BTreeMap<u8, Node>) {
        for node in map.values_mut() {
            match node {
                Node::Internal(inner) => Self::clear_dirty_node(inner),
                Node::Segment(seg) => {
                    for buf in seg.values_mut() {
                        buf.dirty = false;
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.root.clear();
        self.last_touched_page = None;
    }
}

impl Default for RadixIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "radix_tests.rs"]
mod tests;
