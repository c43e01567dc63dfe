// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the message broker

pub mod broker;
pub mod traced;

pub use broker::{
    Acker, AmqpBroker, AmqpChannel, AmqpConnection, BrokerAdapter, BrokerChannel,
    BrokerConnection, BrokerError, BrokerEvent, ChannelOf, Delivery, DeliveryStream, EventSink,
    OutgoingMessage, PublishConfirm,
};
pub use traced::{TracedBroker, TracedChannel, TracedConnection};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use broker::{BrokerCall, FakeBroker, FakeChannel, FakeConnection};
