// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::broker::{
    BrokerAdapter, BrokerChannel, BrokerConnection, BrokerError, DeliveryStream, EventSink,
    OutgoingMessage, PublishConfirm,
};
use async_trait::async_trait;
use jl_core::{AmqpConfig, ConsumerTag, QueueName, QueueOptions};
use tracing::Instrument;

/// Wrapper that adds tracing to any BrokerAdapter
#[derive(Clone)]
pub struct TracedBroker<B> {
    inner: B,
}

impl<B> TracedBroker<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: BrokerAdapter> BrokerAdapter for TracedBroker<B> {
    type Connection = TracedConnection<B::Connection>;

    async fn connect(
        &self,
        config: &AmqpConfig,
        events: EventSink,
    ) -> Result<Self::Connection, BrokerError> {
        async {
            tracing::info!("connecting");
            let start = std::time::Instant::now();
            let result = self.inner.connect(config, events).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::info!(elapsed_ms, "connected"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "connect failed"),
            }
            result.map(TracedConnection::new)
        }
        .instrument(tracing::info_span!("broker.connect", broker = %config))
        .await
    }
}

/// Wrapper that adds tracing to any BrokerConnection
#[derive(Clone)]
pub struct TracedConnection<C> {
    inner: C,
}

impl<C> TracedConnection<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: BrokerConnection> BrokerConnection for TracedConnection<C> {
    type Channel = TracedChannel<C::Channel>;

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn open_channel(&self, prefetch: u16) -> Result<Self::Channel, BrokerError> {
        let result = self.inner.open_channel(prefetch).await;
        tracing::info_span!("connection.open_channel", prefetch).in_scope(|| match &result {
            Ok(_) => tracing::debug!("channel open"),
            Err(e) => tracing::error!(error = %e, "open channel failed"),
        });
        result.map(TracedChannel::new)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let result = self.inner.close().await;
        tracing::info_span!("connection.close").in_scope(|| match &result {
            Ok(()) => tracing::info!("closed"),
            Err(e) => tracing::warn!(error = %e, "close failed (may be expected)"),
        });
        result
    }
}

/// Wrapper that adds tracing to any BrokerChannel
#[derive(Clone)]
pub struct TracedChannel<C> {
    inner: C,
}

impl<C> TracedChannel<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: BrokerChannel> BrokerChannel for TracedChannel<C> {
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn declare_queue(
        &self,
        queue: &QueueName,
        options: QueueOptions,
    ) -> Result<(), BrokerError> {
        let result = self.inner.declare_queue(queue, options).await;
        tracing::info_span!("channel.declare", queue = queue.as_str()).in_scope(|| match &result
        {
            Ok(()) => tracing::debug!(
                durable = options.durable,
                auto_delete = options.auto_delete,
                "declared"
            ),
            Err(e) => tracing::error!(error = %e, "declare failed"),
        });
        result
    }

    async fn consume(
        &self,
        queue: &QueueName,
        tag: &ConsumerTag,
    ) -> Result<DeliveryStream, BrokerError> {
        async {
            let result = self.inner.consume(queue, tag).await;
            match &result {
                Ok(_) => tracing::info!("consumer started"),
                Err(e) => tracing::error!(error = %e, "consume failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "channel.consume",
            queue = queue.as_str(),
            consumer_tag = tag.as_str()
        ))
        .await
    }

    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError> {
        let result = self.inner.cancel(tag).await;
        tracing::info_span!("channel.cancel", consumer_tag = tag.as_str()).in_scope(
            || match &result {
                Ok(()) => tracing::info!("consumer cancelled"),
                Err(e) => tracing::warn!(error = %e, "cancel failed"),
            },
        );
        result
    }

    async fn publish(
        &self,
        queue: &QueueName,
        message: OutgoingMessage,
    ) -> Result<PublishConfirm, BrokerError> {
        let body_len = message.body.len();
        let result = self.inner.publish(queue, message).await;
        tracing::info_span!("channel.publish", queue = queue.as_str()).in_scope(|| {
            match &result {
                Ok(_) => tracing::debug!(body_len, "published"),
                Err(e) => tracing::error!(body_len, error = %e, "publish failed"),
            }
        });
        result
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let result = self.inner.close().await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "channel close failed (may be expected)");
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
