// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy for the workspace.
//!
//! Argument-domain and resource-exhaustion errors are surfaced directly;
//! corruption and OS errors are wrapped so the offending offset or underlying
//! `io::Error` survives. Downstream crates (`keelwork-storage`,
//! `keelwork-alloc`) wrap this type via `#[from]` rather than duplicating it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation timed out")]
    Timeout,

    #[error("pool exhausted (max = {max})")]
    PoolExhausted { max: usize },

    #[error("os error: {0}")]
    Os(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
