// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-file transaction log: a side file that lets a transaction commit
//! or roll back atomically across a process crash.
//!
//! Recovery hinges on a single bit: `is_clean`. While a transaction is
//! open the log is rewritten on every flush with `is_clean = false`; commit
//! flips that one field to `true` in place — the atomic commit point — and
//! only then does recovery trust the log enough to replay it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use keelwork_core::serializer::{Deserializer, Endianness, Serializer};

use crate::error::{Error, Result};

pub const WAL_MAGIC: u32 = 0x4B57_4C31; // "KWL1"

/// Byte offset of the `is_clean` field within the fixed header, used for
/// the in-place flip at commit.
const IS_CLEAN_OFFSET: u64 = 4;

#[derive(Debug, Clone)]
pub struct WalHeader {
    pub is_clean: bool,
    pub count: u64,
    pub size_on_disk_at_begin: u64,
    pub logical_size: u64,
}

#[derive(Debug, Clone)]
pub struct WalRecord {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// The log path for a backing file `P` is `P-<hash-of-filename>.log`: the
/// hash (not the full path) keeps the name bounded and lets a file moved
/// alongside its log still find it by filename alone.
pub fn log_path_for(backing_path: &Path) -> PathBuf {
    let filename = backing_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let hash = crc32fast::hash(filename.as_bytes());
    backing_path.with_file_name(format!("{filename}-{hash:08x}.log"))
}

fn encode(endianness: Endianness, header: &WalHeader, records: &[WalRecord]) -> Vec<u8> {
    let mut ser = Serializer::new(endianness);
    ser.write_u32(WAL_MAGIC);
    ser.write_u32(header.is_clean as u32);
    ser.write_u64(header.count);
    ser.write_u64(header.size_on_disk_at_begin);
    ser.write_u64(header.logical_size);
    for record in records {
        ser.write_u64(record.offset);
        ser.write_bytes(&record.bytes);
    }
    ser.into_bytes()
}

/// The magic's own byte order tells us the endianness the rest of the log
/// was written in, so recovery never has to be told which order to expect.
fn detect_endianness(buf: &[u8]) -> Result<Endianness> {
    if buf.len() < 4 {
        return Err(Error::Corruption { offset: 0, message: "WAL header truncated before magic".into() });
    }
    if LittleEndian::read_u32(&buf[..4]) == WAL_MAGIC {
        Ok(Endianness::Little)
    } else if BigEndian::read_u32(&buf[..4]) == WAL_MAGIC {
        Ok(Endianness::Big)
    } else {
        Err(Error::Corruption { offset: 0, message: "bad WAL magic".into() })
    }
}

fn decode(buf: &[u8]) -> Result<(WalHeader, Vec<WalRecord>)> {
    let endianness = detect_endianness(buf)?;
    let mut de = Deserializer::new(endianness, buf);
    let magic = de.read_u32()?;
    debug_assert_eq!(magic, WAL_MAGIC);
    let is_clean = de.read_u32()? != 0;
    let count = de.read_u64()?;
    let size_on_disk_at_begin = de.read_u64()?;
    let logical_size = de.read_u64()?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = de.read_u64()?;
        let bytes = de.read_bytes()?.to_vec();
        records.push(WalRecord { offset, bytes });
    }
    Ok((WalHeader { is_clean, count, size_on_disk_at_begin, logical_size }, records))
}

/// Rewrite the log from scratch with `is_clean = false`. Called on every
/// flush while a transaction is open; `records` is the cumulative set of
/// buffers dirtied since the transaction began (not just this flush's).
pub fn write_log(path: &Path, endianness: Endianness, size_on_disk_at_begin: u64, logical_size: u64, records: &[WalRecord]) -> Result<()> {
    let header = WalHeader { is_clean: false, count: records.len() as u64, size_on_disk_at_begin, logical_size };
    let bytes = encode(endianness, &header, records);
    let mut file = File::create(path).map_err(keelwork_core::Error::from)?;
    file.write_all(&bytes).map_err(keelwork_core::Error::from)?;
    file.sync_all().map_err(keelwork_core::Error::from)?;
    Ok(())
}

/// Flip `is_clean` from 0 to 1 in place. This is the atomic commit point:
/// from this instant, recovery will trust and replay the log.
pub fn mark_clean(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path).map_err(keelwork_core::Error::from)?;
    let mut magic_bytes = [0u8; 4];
    file.read_exact(&mut magic_bytes).map_err(keelwork_core::Error::from)?;
    let endianness = detect_endianness(&magic_bytes)?;

    let mut ser = Serializer::new(endianness);
    ser.write_u32(1);
    file.seek(SeekFrom::Start(IS_CLEAN_OFFSET)).map_err(keelwork_core::Error::from)?;
    file.write_all(&ser.into_bytes()).map_err(keelwork_core::Error::from)?;
    file.sync_all().map_err(keelwork_core::Error::from)?;
    Ok(())
}

pub fn read_log(path: &Path) -> Result<(WalHeader, Vec<WalRecord>)> {
    let mut file = File::open(path).map_err(keelwork_core::Error::from)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(keelwork_core::Error::from)?;
    decode(&buf)
}

pub fn delete_log(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(keelwork_core::Error::from(err).into()),
    }
}

/// Replay `records` into `backing`, clipping to `logical_size`: a record
/// starting at or past `logical_size` is skipped, one that straddles it is
/// truncated. Then the backing file itself is truncated to `logical_size`.
pub fn replay(backing: &mut File, logical_size: u64, records: &[WalRecord]) -> Result<()> {
    for record in records {
        if record.offset >= logical_size {
            continue;
        }
        let max_len = (logical_size - record.offset) as usize;
        let bytes = if record.bytes.len() > max_len { &record.bytes[..max_len] } else { &record.bytes[..] };
        backing.seek(SeekFrom::Start(record.offset)).map_err(keelwork_core::Error::from)?;
        backing.write_all(bytes).map_err(keelwork_core::Error::from)?;
    }
    backing.set_len(logical_size).map_err(keelwork_core::Error::from)?;
    backing.sync_all().map_err(keelwork_core::Error::from)?;
    Ok(())
}

/// Run crash recovery for `backing_path` if a log for it exists. Replays
/// and deletes the log if it is clean; otherwise just deletes it.
pub fn recover_on_open(backing_path: &Path) -> Result<()> {
    let log_path = log_path_for(backing_path);
    if !log_path.exists() {
        return Ok(());
    }
    match read_log(&log_path) {
        Ok((header, records)) if header.is_clean => {
            let mut backing = OpenOptions::new().read(true).write(true).open(backing_path).map_err(keelwork_core::Error::from)?;
            replay(&mut backing, header.logical_size, &records)?;
            delete_log(&log_path)
        }
        Ok(_) => {
            tracing::warn!(log = %log_path.display(), "discarding unclean transaction log found at open");
            delete_log(&log_path)
        }
        Err(err) => {
            tracing::warn!(log = %log_path.display(), error = %err, "discarding unreadable transaction log found at open");
            delete_log(&log_path)
        }
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
