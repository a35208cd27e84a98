// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A random-access file wrapped in a copy-on-write page cache, with
//! transactions that commit or roll back atomically across a crash.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keelwork_core::serializer::Endianness;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::radix::{Buffer, RadixIndex, PAGE_SIZE};
use crate::wal::{self, WalRecord};

/// Where a `seek` is relative to.
#[derive(Debug, Clone, Copy)]
pub enum SeekFromLogical {
    Start(u64),
    Current(i64),
    End(i64),
}

/// Subscriber to a buffered file's transaction lifecycle. Used by
/// collaborators (such as a BTree-backed index) that keep their own
/// in-memory caches consistent with the file's transaction boundaries.
pub trait TransactionSubscriber: Send + Sync {
    fn on_begin(&self) {}
    fn on_commit_phase1(&self) {}
    fn on_commit_phase2(&self) {}
    fn on_abort(&self) {}
}

struct Inner {
    file: File,
    path: PathBuf,
    logical_size: u64,
    position: u64,
    dirty: bool,
    secure: bool,
    transaction_pending: bool,
    size_on_disk_at_begin: u64,
    /// Buffers flushed to the log since the open transaction began, keyed
    /// by page offset so a later flush within the same transaction
    /// overwrites rather than duplicates an earlier record.
    logged_records: BTreeMap<u64, WalRecord>,
    index: RadixIndex,
    endianness: Endianness,
}

impl Inner {
    fn on_disk_size(&self) -> Result<u64> {
        Ok(self.file.metadata().map_err(keelwork_core::Error::from)?.len())
    }
}

/// A buffered file: copy-on-write page cache plus transactional semantics.
pub struct BufferedFile {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<Arc<dyn TransactionSubscriber>>>,
}

impl BufferedFile {
    /// Open (creating if absent) `path`, running crash recovery first if a
    /// transaction log for it is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        Self::open_with_endianness(path, Endianness::native())
    }

    pub fn open_with_endianness(path: impl AsRef<Path>, endianness: Endianness) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        wal::recover_on_open(&path)?;

        let file = OpenOptions::new().read(true).write(true).create(true).open(&path).map_err(keelwork_core::Error::from)?;
        let on_disk_size = file.metadata().map_err(keelwork_core::Error::from)?.len();

        Ok(Arc::new(Self {
            inner: Mutex::new(Inner {
                file,
                path,
                logical_size: on_disk_size,
                position: 0,
                dirty: false,
                secure: false,
                transaction_pending: false,
                size_on_disk_at_begin: 0,
                logged_records: BTreeMap::new(),
                index: RadixIndex::new(),
                endianness,
            }),
            subscribers: Mutex::new(Vec::new()),
        }))
    }

    pub fn subscribe(&self, subscriber: Arc<dyn TransactionSubscriber>) {
        self.subscribers.lock().push(subscriber);
    }

    pub fn logical_size(&self) -> u64 {
        self.inner.lock().logical_size
    }

    pub fn position(&self) -> u64 {
        self.inner.lock().position
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub fn is_transaction_pending(&self) -> bool {
        self.inner.lock().transaction_pending
    }

    pub fn set_secure(&self, secure: bool) {
        self.inner.lock().secure = secure;
    }

    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.transaction_pending {
            drop(inner);
            self.abort_transaction()?;
            inner = self.inner.lock();
        }
        if inner.dirty {
            Self::flush_locked(&mut inner)?;
        }
        Ok(())
    }

    pub fn seek(&self, from: SeekFromLogical) -> Result<u64> {
        let mut inner = self.inner.lock();
        let new_position = match from {
            SeekFromLogical::Start(p) => p as i128,
            SeekFromLogical::Current(delta) => inner.position as i128 + delta as i128,
            SeekFromLogical::End(delta) => inner.logical_size as i128 + delta as i128,
        };
        if new_position < 0 {
            return Err(Error::SeekBeforeStart);
        }
        inner.position = new_position as u64;
        Ok(inner.position)
    }

    /// Read `n` bytes starting at the current position, advancing it.
    pub fn read(&self, n: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let position = inner.position;
        let bytes = Self::read_at_locked(&mut inner, position, n)?;
        inner.position += bytes.len() as u64;
        Ok(bytes)
    }

    /// Read `n` bytes at `offset` without moving the cursor.
    pub fn read_at(&self, offset: u64, n: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        Self::read_at_locked(&mut inner, offset, n)
    }

    fn read_at_locked(inner: &mut Inner, offset: u64, n: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        let mut remaining = n;
        let mut cursor = offset;
        let mut written = 0usize;
        while remaining > 0 {
            if cursor >= inner.logical_size {
                break; // past logical end reads as zero; `out` is already zeroed
            }
            let page_offset = (cursor / PAGE_SIZE as u64) * PAGE_SIZE as u64;
            let in_page = (cursor - page_offset) as usize;
            let path = &inner.path;
            let file = &mut inner.file;
            let on_disk_size = file.metadata().map_err(keelwork_core::Error::from)?.len();
            let buffer = inner.index.get_or_insert_with(cursor, |page_start| {
                Self::materialize_page(file, path, page_start, on_disk_size)
            });
            let available = buffer.len.saturating_sub(in_page);
            let take = available.min(remaining);
            out[written..written + take].copy_from_slice(&buffer.bytes[in_page..in_page + take]);
            written += take;
            remaining -= take;
            cursor += take as u64;
            if take == 0 {
                // buffer had nothing left to give at this offset (e.g. a page
                // whose valid length ends exactly at `in_page`): stop, rest stays zero.
                break;
            }
        }
        Ok(out)
    }

    fn materialize_page(file: &mut File, _path: &Path, page_start: u64, on_disk_size: u64) -> Buffer {
        let mut buf = Buffer::new_zeroed(page_start);
        if page_start < on_disk_size {
            let valid = ((on_disk_size - page_start).min(PAGE_SIZE as u64)) as usize;
            if file.seek(SeekFrom::Start(page_start)).is_ok() {
                let _ = file.read_exact(&mut buf.bytes[..valid]);
            }
            buf.len = valid;
        }
        buf
    }

    /// Write `bytes` at the current position, advancing it.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let position = inner.position;
        Self::write_at_locked(&mut inner, position, bytes)?;
        inner.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::write_at_locked(&mut inner, offset, bytes)
    }

    fn write_at_locked(inner: &mut Inner, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut remaining = bytes;
        let mut cursor = offset;
        while !remaining.is_empty() {
            let page_offset = (cursor / PAGE_SIZE as u64) * PAGE_SIZE as u64;
            let in_page = (cursor - page_offset) as usize;
            let path = &inner.path;
            let file = &mut inner.file;
            let on_disk_size = file.metadata().map_err(keelwork_core::Error::from)?.len();
            let buffer = inner.index.get_or_insert_with(cursor, |page_start| {
                Self::materialize_page(file, path, page_start, on_disk_size)
            });
            let take = remaining.len().min(PAGE_SIZE - in_page);
            buffer.bytes[in_page..in_page + take].copy_from_slice(&remaining[..take]);
            buffer.len = buffer.len.max(in_page + take);
            buffer.dirty = true;
            cursor += take as u64;
            remaining = &remaining[take..];
        }
        inner.logical_size = inner.logical_size.max(offset + bytes.len() as u64);
        inner.dirty = true;
        Ok(())
    }

    /// Shrink or grow the logical size. Shrinking drops any buffer past the
    /// new size and truncates one straddling it.
    pub fn set_size(&self, new_size: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if new_size < inner.logical_size {
            inner.index.truncate_to(new_size);
        }
        inner.logical_size = new_size;
        inner.dirty = true;
        Ok(())
    }

    /// Flush dirty buffers: directly to the backing file if no transaction
    /// is open, or to the side log if one is.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::flush_locked(&mut inner)
    }

    fn flush_locked(inner: &mut Inner) -> Result<()> {
        if inner.transaction_pending {
            Self::flush_to_log(inner)
        } else {
            Self::flush_to_backing_file(inner)
        }
    }

    fn flush_to_backing_file(inner: &mut Inner) -> Result<()> {
        let dirty: Vec<(u64, usize, Vec<u8>)> =
            inner.index.dirty_buffers().into_iter().map(|b| (b.offset, b.len, b.bytes[..b.len].to_vec())).collect();
        for (offset, _len, bytes) in &dirty {
            inner.file.seek(SeekFrom::Start(*offset)).map_err(keelwork_core::Error::from)?;
            inner.file.write_all(bytes).map_err(keelwork_core::Error::from)?;
        }
        inner.file.set_len(inner.logical_size).map_err(keelwork_core::Error::from)?;
        inner.file.sync_all().map_err(keelwork_core::Error::from)?;
        inner.index.clear_all_dirty();
        inner.dirty = false;
        Ok(())
    }

    fn flush_to_log(inner: &mut Inner) -> Result<()> {
        for buffer in inner.index.dirty_buffers() {
            inner.logged_records.insert(buffer.offset, WalRecord { offset: buffer.offset, bytes: buffer.bytes[..buffer.len].to_vec() });
        }
        inner.index.clear_all_dirty();
        let records: Vec<WalRecord> = inner.logged_records.values().cloned().collect();
        let log_path = wal::log_path_for(&inner.path);
        wal::write_log(&log_path, inner.endianness, inner.size_on_disk_at_begin, inner.logical_size, &records)
    }

    /// Begin a transaction: flushes pre-existing dirty state directly to
    /// disk first, then every subsequent flush targets the side log.
    pub fn begin_transaction(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            if inner.transaction_pending {
                return Err(Error::TransactionAlreadyOpen);
            }
        }
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_begin();
        }
        let mut inner = self.inner.lock();
        Self::flush_to_backing_file(&mut inner)?;
        inner.size_on_disk_at_begin = inner.on_disk_size()?;
        inner.logged_records.clear();
        inner.transaction_pending = true;
        Ok(())
    }

    /// Two-phase commit: subscribers quiesce then finalise, the log is
    /// flushed and flipped clean (the atomic commit point), then replayed
    /// into the backing file immediately so in-process state matches disk.
    pub fn commit_transaction(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            if !inner.transaction_pending {
                return Err(Error::NoTransactionOpen);
            }
        }
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_commit_phase1();
        }
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_commit_phase2();
        }

        let mut inner = self.inner.lock();
        Self::flush_to_log(&mut inner)?;
        let log_path = wal::log_path_for(&inner.path);
        wal::mark_clean(&log_path)?;

        let records: Vec<WalRecord> = inner.logged_records.values().cloned().collect();
        wal::replay(&mut inner.file, inner.logical_size, &records)?;
        wal::delete_log(&log_path)?;

        inner.logged_records.clear();
        inner.transaction_pending = false;
        inner.dirty = false;
        Ok(())
    }

    /// Roll back to the state at `begin_transaction`: drop every buffer
    /// dirtied during the transaction and restore the on-disk size.
    pub fn abort_transaction(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            if !inner.transaction_pending {
                return Err(Error::NoTransactionOpen);
            }
        }
        let mut inner = self.inner.lock();
        let size_on_disk_at_begin = inner.size_on_disk_at_begin;
        inner.index.clear();
        inner.logical_size = size_on_disk_at_begin;
        inner.dirty = false;
        inner.logged_records.clear();
        inner.transaction_pending = false;
        let log_path = wal::log_path_for(&inner.path);
        drop(inner);
        wal::delete_log(&log_path)?;

        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_abort();
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "buffered_file_tests.rs"]
mod tests;
