// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] keelwork_core::Error),

    #[error(transparent)]
    Storage(#[from] keelwork_storage::Error),

    #[error("corrupt block at offset {offset}: {message}")]
    Corruption { offset: u64, message: String },

    #[error("double free of block at offset {offset}")]
    DoubleFree { offset: u64 },

    #[error("file format mismatch: {message}")]
    FormatMismatch { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
