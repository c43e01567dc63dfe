// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Jobline engine: publishing jobs and consuming them with registered
//! handlers over one managed broker connection

mod channel;
mod connection;
mod consumer;
mod error;
mod handler;
mod logger;
mod policy;
mod registry;
mod runtime;
mod work_queue;

#[cfg(test)]
mod test_helpers;

pub use connection::ConnectionStatus;
pub use error::{EnqueueError, JobError, RuntimeError};
pub use handler::{Handler, JobFuture, SubscriptionActions};
pub use logger::Logger;
pub use policy::HandlerInfo;
pub use registry::Registry;
pub use runtime::{Runtime, RuntimeConfig};
pub use work_queue::{JobOptions, PublishHandle};
