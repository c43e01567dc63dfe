// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! What happens to a delivery whose job failed.
//!
//! The policy sees the error, the handler, the payload and the headers and
//! returns either a [`Disposition`] or an error:
//!
//! - `Ok(Disposition::Ack)`: the delivery is acknowledged and dropped
//! - `Ok(Disposition::Requeue)`: the delivery is nacked with requeue
//! - `Err(_)`: the delivery stays unacknowledged and the error is escalated
//!   to the worker as fatal
//!
//! The default logs `"<queue> failed: <error>"` and returns the error.

use std::panic::Location;
use std::sync::Arc;

use jl_core::{ConsumerTag, Disposition, HandlerKind, Headers, Payload, QueueName};

use crate::logger::Logger;
use crate::JobError;

/// The handler a failed job belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub queue: QueueName,
    pub kind: HandlerKind,
    pub consumer_tag: Option<ConsumerTag>,
    /// Whether the broker had delivered this job before
    pub redelivered: bool,
    /// Where the handler was registered
    pub location: &'static Location<'static>,
}

type PolicyFn =
    dyn Fn(JobError, &HandlerInfo, &Payload, &Headers) -> Result<Disposition, JobError> + Send + Sync;

#[derive(Clone, Default)]
pub(crate) enum ErrorPolicy {
    #[default]
    LogAndRaise,
    Custom(Arc<PolicyFn>),
}

impl ErrorPolicy {
    pub(crate) fn custom<F>(policy: F) -> Self
    where
        F: Fn(JobError, &HandlerInfo, &Payload, &Headers) -> Result<Disposition, JobError>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(policy))
    }

    pub(crate) fn decide(
        &self,
        err: JobError,
        info: &HandlerInfo,
        payload: &Payload,
        headers: &Headers,
        logger: &Logger,
    ) -> Result<Disposition, JobError> {
        match self {
            Self::LogAndRaise => {
                tracing::error!(queue = info.queue.as_str(), error = %err, "job failed");
                logger.log(&format!("{} failed: {}", info.queue, err));
                Err(err)
            }
            Self::Custom(policy) => policy(err, info, payload, headers),
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
