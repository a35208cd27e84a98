// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    RunLoop(#[from] keelwork_runloop::Error),

    #[error("pool exhausted: {max} elements already in use")]
    PoolExhausted { max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
