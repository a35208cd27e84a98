// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("run-loop is stopped")]
    Stopped,

    #[error(transparent)]
    Core(#[from] keelwork_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
