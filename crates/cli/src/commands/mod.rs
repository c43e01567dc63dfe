// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations

pub mod consume;
pub mod enqueue;

use jl_adapters::{AmqpBroker, TracedBroker};

/// Broker adapter used by every command
pub(crate) fn broker() -> TracedBroker<AmqpBroker> {
    TracedBroker::new(AmqpBroker::new().with_connection_name("jobline"))
}
