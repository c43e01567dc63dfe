// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message broker adapters.
//!
//! The engine talks to the broker through three traits mirroring the AMQP
//! object model: an adapter that connects, a connection that opens
//! channels, and a channel that declares, consumes, publishes and cancels.
//! Asynchronous notifications (transport loss, fatal protocol errors,
//! channel errors) arrive on the [`EventSink`] handed to `connect`.

mod amqp;

pub use amqp::{AmqpBroker, AmqpChannel, AmqpConnection};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BrokerCall, FakeBroker, FakeChannel, FakeConnection};

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use jl_core::{AmqpConfig, ConsumerTag, Headers, QueueName, QueueOptions};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from broker operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("channel error: {0}")]
    Channel(String),
    #[error("declare failed for queue {queue}: {reason}")]
    Declare { queue: String, reason: String },
    #[error("consume failed: {0}")]
    Consume(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("publish to {0} was rejected by the broker")]
    Nacked(String),
    #[error("message to {0} was not routed to any queue")]
    Unroutable(String),
    #[error("acknowledgement failed: {0}")]
    Ack(String),
    #[error("{0} is closed")]
    Closed(&'static str),
    #[error("close failed: {0}")]
    Close(String),
}

/// Out-of-band notifications raised by a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// The socket went away; reconnecting may succeed
    TransportLost(String),
    /// The broker rejected the session at protocol level; do not retry
    Fatal(String),
    /// A channel-level failure; the connection itself is fine
    ChannelError(String),
}

/// Where a connection reports its [`BrokerEvent`]s.
pub type EventSink = mpsc::UnboundedSender<BrokerEvent>;

/// Deliveries for one consumer, in broker order.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// Resolves once the broker has confirmed (or refused) a publish.
pub type PublishConfirm = BoxFuture<'static, Result<(), BrokerError>>;

/// Channel type produced by a broker adapter's connections.
pub type ChannelOf<B> = <<B as BrokerAdapter>::Connection as BrokerConnection>::Channel;

/// A message to publish on the default exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub body: Vec<u8>,
    pub content_type: String,
    pub headers: Headers,
    /// Ask the broker to return the message if no queue receives it
    pub mandatory: bool,
}

/// Settles one delivery with the broker.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// A message received by a consumer.
pub struct Delivery {
    pub delivery_tag: u64,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub headers: Headers,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(
        delivery_tag: u64,
        routing_key: impl Into<String>,
        body: Vec<u8>,
        content_type: Option<String>,
        headers: Headers,
        acker: Box<dyn Acker>,
    ) -> Self {
        Self {
            delivery_tag,
            routing_key: routing_key.into(),
            redelivered: false,
            body,
            content_type,
            headers,
            acker,
        }
    }

    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Remove the delivery from its queue.
    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Refuse the delivery, optionally asking the broker to requeue it.
    pub async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("routing_key", &self.routing_key)
            .field("redelivered", &self.redelivered)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Entry point to a broker: establishes connections.
#[async_trait]
pub trait BrokerAdapter: Clone + Send + Sync + 'static {
    type Connection: BrokerConnection;

    /// Open a connection. Later transport loss or fatal errors are
    /// reported on `events`, never as return values.
    async fn connect(
        &self,
        config: &AmqpConfig,
        events: EventSink,
    ) -> Result<Self::Connection, BrokerError>;
}

/// A live broker connection.
#[async_trait]
pub trait BrokerConnection: Clone + Send + Sync + 'static {
    type Channel: BrokerChannel;

    fn is_open(&self) -> bool;

    /// Open a channel with the given prefetch limit and publisher confirms.
    async fn open_channel(&self, prefetch: u16) -> Result<Self::Channel, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// A channel on a broker connection.
#[async_trait]
pub trait BrokerChannel: Clone + Send + Sync + 'static {
    fn is_open(&self) -> bool;

    /// Declare the queue, or assert it exists with matching options.
    async fn declare_queue(
        &self,
        queue: &QueueName,
        options: QueueOptions,
    ) -> Result<(), BrokerError>;

    /// Start a consumer with explicit acknowledgement.
    async fn consume(
        &self,
        queue: &QueueName,
        tag: &ConsumerTag,
    ) -> Result<DeliveryStream, BrokerError>;

    /// Stop a consumer. Its delivery stream ends.
    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError>;

    /// Publish on the default exchange with `queue` as routing key.
    async fn publish(
        &self,
        queue: &QueueName,
        message: OutgoingMessage,
    ) -> Result<PublishConfirm, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
