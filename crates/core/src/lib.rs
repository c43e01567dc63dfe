// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jl-core: Core data types for the jobline job queue

pub mod chain;
pub mod config;
pub mod handler;
pub mod id;
pub mod payload;
pub mod predicate;

pub use chain::{ChainError, Hop, NextJob, Route, NEXT_JOB_FIELD};
pub use config::{AmqpConfig, ConfigError, AMQPS_PORT, AMQP_PORT, DEFAULT_AMQP_URL};
pub use handler::{ActivationState, Disposition, HandlerKind, QueueOptions, Transition};
pub use id::{ConsumerTag, IdGen, QueueName, SequentialIdGen, UuidIdGen};
pub use payload::{Envelope, Headers, Payload, JSON_CONTENT_TYPE};
pub use predicate::{ActivationPredicate, Always, Toggle};
