// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] keelwork_core::Error),

    #[error("corrupt buffered file at offset {offset}: {message}")]
    Corruption { offset: u64, message: String },

    #[error("a transaction is already open on this file")]
    TransactionAlreadyOpen,

    #[error("no transaction is open on this file")]
    NoTransactionOpen,

    #[error("seek before the start of the file")]
    SeekBeforeStart,
}

pub type Result<T> = std::result::Result<T, Error>;
