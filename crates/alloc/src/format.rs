// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout: the file header, and the header/footer pair that frames
//! every block in the heap.

use keelwork_core::serializer::{Deserializer, Endianness, Serializer};

use crate::error::{Error, Result};

pub const FILE_MAGIC: u32 = 0x4B41_4C31; // "KAL1"
pub const BLOCK_MAGIC: u32 = 0x4B42_4C4B; // "KBLK"

pub const HEADER_FLAG_SECURE: u32 = 1 << 0;
pub const HEADER_FLAG_MAGIC_FRAMES: u32 = 1 << 1;

pub const BLOCK_FLAG_FREE: u32 = 1 << 0;
pub const BLOCK_FLAG_BTREE_NODE: u32 = 1 << 1;

/// A small lower bound on payload size so that even a minimal block still
/// frames cleanly; kept simple since the free-space index lives outside the
/// block payload rather than inside it (see DESIGN.md).
pub const MIN_USER_DATA_SIZE: u64 = 16;

/// Fixed payload size for every BTree-node block, so the free-btree-node
/// list can be a plain singly-linked list without per-entry size tracking.
pub const BTREE_NODE_PAYLOAD_SIZE: u64 = 4096;

/// `version (u16) flags (u32) heapStart (u64) btreeOffset (u64)
/// freeBTreeNodeOffset (u64) rootOffset (u64)`, preceded by [`FILE_MAGIC`].
pub const FILE_HEADER_LEN: u64 = 4 + 2 + 4 + 8 + 8 + 8 + 8;

#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub version: u16,
    pub flags: u32,
    pub heap_start: u64,
    pub btree_offset: u64,
    pub free_btree_node_offset: u64,
    pub root_offset: u64,
}

impl FileHeader {
    pub fn secure(&self) -> bool {
        self.flags & HEADER_FLAG_SECURE != 0
    }

    pub fn magic_frames(&self) -> bool {
        self.flags & HEADER_FLAG_MAGIC_FRAMES != 0
    }

    pub fn encode(&self, endianness: Endianness) -> Vec<u8> {
        let mut ser = Serializer::with_capacity(endianness, FILE_HEADER_LEN as usize);
        ser.write_u32(FILE_MAGIC);
        ser.write_u16(self.version);
        ser.write_u32(self.flags);
        ser.write_u64(self.heap_start);
        ser.write_u64(self.btree_offset);
        ser.write_u64(self.free_btree_node_offset);
        ser.write_u64(self.root_offset);
        ser.into_bytes()
    }

    pub fn decode(endianness: Endianness, bytes: &[u8]) -> Result<Self> {
        let mut de = Deserializer::new(endianness, bytes);
        let magic = de.read_u32().map_err(keelwork_core::Error::from)?;
        if magic != FILE_MAGIC {
            return Err(Error::Corruption { offset: 0, message: "bad file header magic".into() });
        }
        let version = de.read_u16().map_err(keelwork_core::Error::from)?;
        let flags = de.read_u32().map_err(keelwork_core::Error::from)?;
        let heap_start = de.read_u64().map_err(keelwork_core::Error::from)?;
        let btree_offset = de.read_u64().map_err(keelwork_core::Error::from)?;
        let free_btree_node_offset = de.read_u64().map_err(keelwork_core::Error::from)?;
        let root_offset = de.read_u64().map_err(keelwork_core::Error::from)?;
        Ok(Self { version, flags, heap_start, btree_offset, free_btree_node_offset, root_offset })
    }
}

/// Header/footer frame for one heap block. `next_free_btree_node` is only
/// meaningful for a free BTree-node block, but the field is always present
/// so the frame stays fixed-width across flag transitions (a block reused
/// from the free-btree-node list doesn't change shape when it's allocated).
#[derive(Debug, Clone, Copy)]
pub struct BlockFrame {
    pub flags: u32,
    pub size: u64,
    pub next_free_btree_node: u64,
}

impl BlockFrame {
    pub fn is_free(&self) -> bool {
        self.flags & BLOCK_FLAG_FREE != 0
    }

    pub fn is_btree_node(&self) -> bool {
        self.flags & BLOCK_FLAG_BTREE_NODE != 0
    }

    pub fn header_len(magic_frames: bool) -> u64 {
        (if magic_frames { 4 } else { 0 }) + 4 + 8 + 8
    }

    pub fn footer_len(magic_frames: bool) -> u64 {
        (if magic_frames { 4 } else { 0 }) + 4 + 8
    }

    pub fn frame_len(magic_frames: bool) -> u64 {
        Self::header_len(magic_frames) + Self::footer_len(magic_frames)
    }

    pub fn encode_header(&self, endianness: Endianness, magic_frames: bool) -> Vec<u8> {
        let mut ser = Serializer::with_capacity(endianness, Self::header_len(magic_frames) as usize);
        if magic_frames {
            ser.write_u32(BLOCK_MAGIC);
        }
        ser.write_u32(self.flags);
        ser.write_u64(self.size);
        ser.write_u64(self.next_free_btree_node);
        ser.into_bytes()
    }

    pub fn encode_footer(&self, endianness: Endianness, magic_frames: bool) -> Vec<u8> {
        let mut ser = Serializer::with_capacity(endianness, Self::footer_len(magic_frames) as usize);
        if magic_frames {
            ser.write_u32(BLOCK_MAGIC);
        }
        ser.write_u32(self.flags);
        ser.write_u64(self.size);
        ser.into_bytes()
    }

    pub fn decode_header(endianness: Endianness, magic_frames: bool, bytes: &[u8], offset: u64) -> Result<Self> {
        let mut de = Deserializer::new(endianness, bytes);
        if magic_frames {
            let magic = de.read_u32().map_err(keelwork_core::Error::from)?;
            if magic != BLOCK_MAGIC {
                return Err(Error::Corruption { offset, message: "bad block header magic".into() });
            }
        }
        let flags = de.read_u32().map_err(keelwork_core::Error::from)?;
        let size = de.read_u64().map_err(keelwork_core::Error::from)?;
        let next_free_btree_node = de.read_u64().map_err(keelwork_core::Error::from)?;
        Ok(Self { flags, size, next_free_btree_node })
    }

    pub fn decode_footer(endianness: Endianness, magic_frames: bool, bytes: &[u8], offset: u64) -> Result<(u32, u64)> {
        let mut de = Deserializer::new(endianness, bytes);
        if magic_frames {
            let magic = de.read_u32().map_err(keelwork_core::Error::from)?;
            if magic != BLOCK_MAGIC {
                return Err(Error::Corruption { offset, message: "bad block footer magic".into() });
            }
        }
        let flags = de.read_u32().map_err(keelwork_core::Error::from)?;
        let size = de.read_u64().map_err(keelwork_core::Error::from)?;
        Ok((flags, size))
    }
}
