// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide facts about the host: logical CPU count, page size, native
//! byte order, and process id. Other modules size worker pools and page
//! caches off of this instead of hardcoding platform assumptions.

use std::sync::OnceLock;

use crate::serializer::Endianness;

/// Snapshot of host facts, computed once and cached for the life of the process.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    cpu_count: usize,
    page_size: usize,
    endianness: Endianness,
    process_id: u32,
}

impl SystemInfo {
    fn detect() -> Self {
        Self {
            cpu_count: num_cpus::get(),
            page_size: page_size::get(),
            endianness: Endianness::native(),
            process_id: std::process::id(),
        }
    }

    /// The process-wide singleton, computed lazily on first access.
    pub fn get() -> &'static SystemInfo {
        static INSTANCE: OnceLock<SystemInfo> = OnceLock::new();
        INSTANCE.get_or_init(SystemInfo::detect)
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn native_endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }
}

#[cfg(test)]
#[path = "sysinfo_tests.rs"]
mod tests;
