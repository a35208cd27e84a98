// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A variable-size block heap over a transactional buffered file: `alloc`
//! and `free` with coalescing, backed by a free-space BTree keyed by
//! `(size, offset)`.
//!
//! The allocator never opens or commits a transaction itself — every
//! mutation here is just a set of buffered-file writes; callers wrap the
//! calls they need atomic together in their own transaction.

use std::sync::Arc;

use keelwork_core::serializer::Endianness;
use keelwork_storage::BufferedFile;
use parking_lot::Mutex;

use crate::btree::{BTreeNode, Key, ENTRIES_PER_NODE};
use crate::error::{Error, Result};
use crate::format::{
    BlockFrame, FileHeader, BLOCK_FLAG_BTREE_NODE, BLOCK_FLAG_FREE, BTREE_NODE_PAYLOAD_SIZE, FILE_HEADER_LEN, HEADER_FLAG_SECURE,
    MIN_USER_DATA_SIZE,
};

const FORMAT_VERSION: u16 = 1;

/// Format choices fixed at file creation. `magic_frames` must match on
/// every later open; `secure` is a runtime behaviour and may be changed.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorOptions {
    pub secure: bool,
    pub magic_frames: bool,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self { secure: false, magic_frames: true }
    }
}

struct Inner {
    header: FileHeader,
}

pub struct FileAllocator {
    file: Arc<BufferedFile>,
    endianness: Endianness,
    inner: Mutex<Inner>,
}

impl FileAllocator {
    pub fn open(file: Arc<BufferedFile>, options: AllocatorOptions) -> Result<Arc<Self>> {
        let endianness = Endianness::native();
        let header = if file.logical_size() == 0 {
            let mut flags = 0u32;
            if options.secure {
                flags |= HEADER_FLAG_SECURE;
            }
            if options.magic_frames {
                flags |= crate::format::HEADER_FLAG_MAGIC_FRAMES;
            }
            let header = FileHeader {
                version: FORMAT_VERSION,
                flags,
                heap_start: FILE_HEADER_LEN,
                btree_offset: 0,
                free_btree_node_offset: 0,
                root_offset: 0,
            };
            file.write_at(0, &header.encode(endianness))?;
            header
        } else {
            let bytes = file.read_at(0, FILE_HEADER_LEN as usize)?;
            let mut header = FileHeader::decode(endianness, &bytes)?;
            if header.magic_frames() != options.magic_frames {
                return Err(Error::FormatMismatch {
                    message: format!(
                        "file was created with magic_frames={}, opened with magic_frames={}",
                        header.magic_frames(),
                        options.magic_frames
                    ),
                });
            }
            if options.secure {
                header.flags |= HEADER_FLAG_SECURE;
            } else {
                header.flags &= !HEADER_FLAG_SECURE;
            }
            file.write_at(0, &header.encode(endianness))?;
            header
        };
        Ok(Arc::new(Self { file, endianness, inner: Mutex::new(Inner { header }) }))
    }

    pub fn is_secure(&self) -> bool {
        self.inner.lock().header.secure()
    }

    /// The backing file this allocator reads and writes through. Callers
    /// that need `alloc`/`free` atomic alongside their own writes wrap both
    /// in a transaction on this handle, since the allocator never opens one
    /// itself.
    pub fn file(&self) -> &Arc<BufferedFile> {
        &self.file
    }

    pub fn root_offset(&self) -> u64 {
        self.inner.lock().header.root_offset
    }

    pub fn set_root_offset(&self, offset: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.header.root_offset = offset;
        self.persist_header(&inner.header)
    }

    fn persist_header(&self, header: &FileHeader) -> Result<()> {
        self.file.write_at(0, &header.encode(self.endianness)).map_err(Error::from)
    }

    fn write_frame(&self, magic_frames: bool, header_offset: u64, frame: &BlockFrame) -> Result<()> {
        self.file.write_at(header_offset, &frame.encode_header(self.endianness, magic_frames))?;
        let footer_offset = header_offset + BlockFrame::header_len(magic_frames) + frame.size;
        self.file.write_at(footer_offset, &frame.encode_footer(self.endianness, magic_frames))?;
        Ok(())
    }

    /// Reads a block's header and verifies it against its footer.
    fn read_frame(&self, magic_frames: bool, header_offset: u64) -> Result<BlockFrame> {
        let header_bytes = self.file.read_at(header_offset, BlockFrame::header_len(magic_frames) as usize)?;
        let frame = BlockFrame::decode_header(self.endianness, magic_frames, &header_bytes, header_offset)?;
        let footer_offset = header_offset + BlockFrame::header_len(magic_frames) + frame.size;
        let footer_bytes = self.file.read_at(footer_offset, BlockFrame::footer_len(magic_frames) as usize)?;
        let (footer_flags, footer_size) = BlockFrame::decode_footer(self.endianness, magic_frames, &footer_bytes, footer_offset)?;
        if footer_flags != frame.flags || footer_size != frame.size {
            return Err(Error::Corruption { offset: header_offset, message: "block header/footer mismatch".into() });
        }
        Ok(frame)
    }

    /// Allocate a payload of at least `requested_size` bytes, reusing a
    /// free block from the index when one fits, else growing the heap.
    pub fn alloc(&self, requested_size: u64) -> Result<u64> {
        let mut inner = self.inner.lock();
        let magic_frames = inner.header.magic_frames();
        let header_len = BlockFrame::header_len(magic_frames);
        let footer_len = BlockFrame::footer_len(magic_frames);
        let frame_len = header_len + footer_len;
        let requested = requested_size.max(MIN_USER_DATA_SIZE);

        let payload_offset = if let Some((found_size, found_offset)) = self.btree_find_min_at_least(&inner.header, requested)? {
            self.btree_delete(&mut inner.header, (found_size, found_offset))?;
            let header_offset = found_offset - header_len;
            let leftover = found_size - requested;
            let min_block_size = frame_len + MIN_USER_DATA_SIZE;
            if leftover >= min_block_size {
                let frame = BlockFrame { flags: 0, size: requested, next_free_btree_node: 0 };
                self.write_frame(magic_frames, header_offset, &frame)?;

                let new_free_header_offset = header_offset + header_len + requested + footer_len;
                let new_free_size = leftover - frame_len;
                let free_frame = BlockFrame { flags: BLOCK_FLAG_FREE, size: new_free_size, next_free_btree_node: 0 };
                self.write_frame(magic_frames, new_free_header_offset, &free_frame)?;
                self.btree_insert(&mut inner.header, (new_free_size, new_free_header_offset + header_len))?;
            } else {
                let frame = BlockFrame { flags: 0, size: found_size, next_free_btree_node: 0 };
                self.write_frame(magic_frames, header_offset, &frame)?;
            }
            header_offset + header_len
        } else {
            let header_offset = self.file.logical_size();
            self.file.set_size(header_offset + frame_len + requested)?;
            let frame = BlockFrame { flags: 0, size: requested, next_free_btree_node: 0 };
            self.write_frame(magic_frames, header_offset, &frame)?;
            header_offset + header_len
        };

        self.persist_header(&inner.header)?;
        Ok(payload_offset)
    }

    /// Release a block previously returned by [`alloc`](Self::alloc),
    /// merging it with free neighbours and shrinking the file if it was
    /// the last block in the heap.
    pub fn free(&self, offset: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let magic_frames = inner.header.magic_frames();
        let secure = inner.header.secure();
        let header_len = BlockFrame::header_len(magic_frames);
        let footer_len = BlockFrame::footer_len(magic_frames);
        let frame_len = header_len + footer_len;
        let heap_start = inner.header.heap_start;

        let header_offset =
            offset.checked_sub(header_len).ok_or(Error::Corruption { offset, message: "offset precedes block header".into() })?;
        let frame = self.read_frame(magic_frames, header_offset)?;
        if frame.is_free() {
            return Err(Error::DoubleFree { offset });
        }

        let mut merged_start = header_offset;
        let mut merged_size = frame.size;

        if merged_start > heap_start {
            let footer_offset = merged_start - footer_len;
            let footer_bytes = self.file.read_at(footer_offset, footer_len as usize)?;
            let (prev_flags, prev_size) = BlockFrame::decode_footer(self.endianness, magic_frames, &footer_bytes, footer_offset)?;
            if prev_flags & BLOCK_FLAG_FREE != 0 && prev_flags & BLOCK_FLAG_BTREE_NODE == 0 {
                let prev_header_offset = footer_offset - prev_size - header_len;
                self.btree_delete(&mut inner.header, (prev_size, prev_header_offset + header_len))?;
                merged_start = prev_header_offset;
                merged_size += frame_len + prev_size;
            }
        }

        let next_header_offset = header_offset + header_len + frame.size + footer_len;
        let end_of_heap = self.file.logical_size();
        if next_header_offset < end_of_heap {
            let next_frame = self.read_frame(magic_frames, next_header_offset)?;
            if next_frame.is_free() && !next_frame.is_btree_node() {
                self.btree_delete(&mut inner.header, (next_frame.size, next_header_offset + header_len))?;
                merged_size += frame_len + next_frame.size;
            }
        }

        let merged_end = merged_start + header_len + merged_size + footer_len;
        if merged_end == end_of_heap {
            self.file.set_size(merged_start)?;
        } else {
            if secure {
                self.file.write_at(merged_start + header_len, &vec![0u8; merged_size as usize])?;
            }
            let free_frame = BlockFrame { flags: BLOCK_FLAG_FREE, size: merged_size, next_free_btree_node: 0 };
            self.write_frame(magic_frames, merged_start, &free_frame)?;
            self.btree_insert(&mut inner.header, (merged_size, merged_start + header_len))?;
        }

        self.persist_header(&inner.header)?;
        Ok(())
    }

    /// Allocate a fixed-size block dedicated to holding one BTree node,
    /// from the free-btree-node list if one is available, else by growing
    /// the heap directly — never through the free-space index, so the
    /// index's own growth can't recurse into itself.
    pub fn alloc_btree_node(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let offset = self.alloc_btree_node_raw(&mut inner.header)?;
        self.persist_header(&inner.header)?;
        Ok(offset)
    }

    pub fn free_btree_node(&self, offset: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        self.free_btree_node_raw(&mut inner.header, offset)?;
        self.persist_header(&inner.header)
    }

    /// Smallest free block at least `min_size` bytes, as `(size, offset)`,
    /// or `None` if the free-space index holds nothing that large.
    pub fn free_block_at_least(&self, min_size: u64) -> Result<Option<(u64, u64)>> {
        let inner = self.inner.lock();
        self.btree_find_min_at_least(&inner.header, min_size)
    }

    fn alloc_btree_node_raw(&self, header: &mut FileHeader) -> Result<u64> {
        let magic_frames = header.magic_frames();
        let header_len = BlockFrame::header_len(magic_frames);
        let frame_len = BlockFrame::frame_len(magic_frames);
        if header.free_btree_node_offset != 0 {
            let payload_offset = header.free_btree_node_offset;
            let node_header_offset = payload_offset - header_len;
            let frame = self.read_frame(magic_frames, node_header_offset)?;
            header.free_btree_node_offset = frame.next_free_btree_node;
            let new_frame = BlockFrame { flags: BLOCK_FLAG_BTREE_NODE, size: BTREE_NODE_PAYLOAD_SIZE, next_free_btree_node: 0 };
            self.write_frame(magic_frames, node_header_offset, &new_frame)?;
            Ok(payload_offset)
        } else {
            let node_header_offset = self.file.logical_size();
            self.file.set_size(node_header_offset + frame_len + BTREE_NODE_PAYLOAD_SIZE)?;
            let new_frame = BlockFrame { flags: BLOCK_FLAG_BTREE_NODE, size: BTREE_NODE_PAYLOAD_SIZE, next_free_btree_node: 0 };
            self.write_frame(magic_frames, node_header_offset, &new_frame)?;
            Ok(node_header_offset + header_len)
        }
    }

    fn free_btree_node_raw(&self, header: &mut FileHeader, payload_offset: u64) -> Result<()> {
        let magic_frames = header.magic_frames();
        let header_len = BlockFrame::header_len(magic_frames);
        let frame_len = BlockFrame::frame_len(magic_frames);
        let node_header_offset =
            payload_offset.checked_sub(header_len).ok_or(Error::Corruption { offset: payload_offset, message: "offset precedes block header".into() })?;
        let end_of_heap = self.file.logical_size();
        if node_header_offset + frame_len + BTREE_NODE_PAYLOAD_SIZE == end_of_heap {
            self.file.set_size(node_header_offset)?;
        } else {
            let new_frame = BlockFrame {
                flags: BLOCK_FLAG_FREE | BLOCK_FLAG_BTREE_NODE,
                size: BTREE_NODE_PAYLOAD_SIZE,
                next_free_btree_node: header.free_btree_node_offset,
            };
            self.write_frame(magic_frames, node_header_offset, &new_frame)?;
            header.free_btree_node_offset = payload_offset;
        }
        Ok(())
    }

    fn read_node(&self, offset: u64) -> Result<BTreeNode> {
        let bytes = self.file.read_at(offset, BTREE_NODE_PAYLOAD_SIZE as usize)?;
        BTreeNode::decode(self.endianness, &bytes, offset)
    }

    fn write_node(&self, offset: u64, node: &BTreeNode) -> Result<()> {
        let mut bytes = node.encode(self.endianness);
        bytes.resize(BTREE_NODE_PAYLOAD_SIZE as usize, 0);
        self.file.write_at(offset, &bytes)?;
        Ok(())
    }

    fn btree_insert(&self, header: &mut FileHeader, key: Key) -> Result<()> {
        if header.btree_offset == 0 {
            let node_offset = self.alloc_btree_node_raw(header)?;
            let mut node = BTreeNode::new_leaf();
            node.entries.push(key);
            self.write_node(node_offset, &node)?;
            header.btree_offset = node_offset;
            return Ok(());
        }
        if let Some((promoted, right_offset)) = self.btree_insert_node(header, header.btree_offset, key)? {
            let new_root_offset = self.alloc_btree_node_raw(header)?;
            let mut new_root = BTreeNode::new_internal();
            new_root.entries.push(promoted);
            new_root.children = vec![header.btree_offset, right_offset];
            self.write_node(new_root_offset, &new_root)?;
            header.btree_offset = new_root_offset;
        }
        Ok(())
    }

    fn btree_insert_node(&self, header: &mut FileHeader, node_offset: u64, key: Key) -> Result<Option<(Key, u64)>> {
        let mut node = self.read_node(node_offset)?;
        if node.is_leaf {
            let idx = node.lower_bound(key);
            node.entries.insert(idx, key);
            if node.entries.len() > ENTRIES_PER_NODE {
                let mid = node.entries.len() / 2;
                let right_entries = node.entries.split_off(mid);
                let promoted = right_entries[0];
                let mut right = BTreeNode::new_leaf();
                right.entries = right_entries;
                let right_offset = self.alloc_btree_node_raw(header)?;
                self.write_node(right_offset, &right)?;
                self.write_node(node_offset, &node)?;
                Ok(Some((promoted, right_offset)))
            } else {
                self.write_node(node_offset, &node)?;
                Ok(None)
            }
        } else {
            let idx = node.lower_bound(key);
            let child_offset = node.children[idx];
            match self.btree_insert_node(header, child_offset, key)? {
                Some((promoted, right_offset)) => {
                    node.entries.insert(idx, promoted);
                    node.children.insert(idx + 1, right_offset);
                    if node.entries.len() > ENTRIES_PER_NODE {
                        let mid = node.entries.len() / 2;
                        let promoted_mid = node.entries[mid];
                        let right_entries = node.entries.split_off(mid + 1);
                        node.entries.truncate(mid);
                        let right_children = node.children.split_off(mid + 1);
                        let mut right = BTreeNode::new_internal();
                        right.entries = right_entries;
                        right.children = right_children;
                        let right_offset = self.alloc_btree_node_raw(header)?;
                        self.write_node(right_offset, &right)?;
                        self.write_node(node_offset, &node)?;
                        Ok(Some((promoted_mid, right_offset)))
                    } else {
                        self.write_node(node_offset, &node)?;
                        Ok(None)
                    }
                }
                None => Ok(None),
            }
        }
    }

    /// Removes `key` if present. BTree nodes are never merged or freed on
    /// delete — leaves may become sparse, but search remains correct (see
    /// DESIGN.md).
    fn btree_delete(&self, header: &mut FileHeader, key: Key) -> Result<bool> {
        if header.btree_offset == 0 {
            return Ok(false);
        }
        self.btree_delete_node(header.btree_offset, key)
    }

    fn btree_delete_node(&self, node_offset: u64, key: Key) -> Result<bool> {
        let mut node = self.read_node(node_offset)?;
        if node.is_leaf {
            match node.entries.binary_search(&key) {
                Ok(idx) => {
                    node.entries.remove(idx);
                    self.write_node(node_offset, &node)?;
                    Ok(true)
                }
                Err(_) => Ok(false),
            }
        } else {
            let idx = node.lower_bound(key);
            self.btree_delete_node(node.children[idx], key)
        }
    }

    fn btree_find_min_at_least(&self, header: &FileHeader, min_size: u64) -> Result<Option<Key>> {
        if header.btree_offset == 0 {
            return Ok(None);
        }
        self.btree_find_min_node(header.btree_offset, (min_size, 0))
    }

    fn btree_find_min_node(&self, node_offset: u64, target: Key) -> Result<Option<Key>> {
        let node = self.read_node(node_offset)?;
        let idx = node.lower_bound(target);
        if node.is_leaf {
            Ok(node.entries.get(idx).copied())
        } else {
            let candidate = self.btree_find_min_node(node.children[idx], target)?;
            if candidate.is_some() {
                return Ok(candidate);
            }
            Ok(node.entries.get(idx).copied())
        }
    }
}

#[cfg(test)]
#[path = "alloc_tests.rs"]
mod tests;
