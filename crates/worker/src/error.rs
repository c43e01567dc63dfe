// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jl_engine::RuntimeError;
use thiserror::Error;

/// Errors that end a worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to set up logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
