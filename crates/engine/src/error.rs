// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use jl_adapters::BrokerError;
use jl_core::{ChainError, ConfigError};
use thiserror::Error;

/// Errors from publishing a job
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("queue name must not be empty")]
    EmptyQueue,
    #[error("invalid route: {0}")]
    InvalidRoute(ChainError),
    #[error("failed to encode job data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("enqueue must be called from within a tokio runtime")]
    NoRuntime,
    #[error("publish task ended before the broker confirmed")]
    Dropped,
}

impl From<ChainError> for EnqueueError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::EmptyQueue => Self::EmptyQueue,
            other => Self::InvalidRoute(other),
        }
    }
}

impl From<RuntimeError> for EnqueueError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Broker(e) => Self::Broker(e),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Errors from running one job
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Callback(anyhow::Error),
    #[error("failed to forward result: {0}")]
    Forward(#[from] EnqueueError),
    #[error("no handler registered for queue '{0}'")]
    UnknownHandler(String),
}

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("invalid queue name: {0:?}")]
    InvalidQueue(String),
    #[error("job on {queue} failed: {source}")]
    Job { queue: String, source: JobError },
    #[error("broker closed the connection: {0}")]
    Fatal(String),
    #[error("consumer on {queue} died: {reason}")]
    ConsumerDied { queue: String, reason: String },
    #[error("runtime is stopped")]
    Stopped,
}
