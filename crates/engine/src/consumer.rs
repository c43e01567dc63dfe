// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscribing handlers to their queues and working off deliveries

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use jl_adapters::{BrokerAdapter, BrokerChannel, Delivery, DeliveryStream};
use jl_core::{ConsumerTag, Disposition, Payload};
use tokio::task::{JoinError, JoinHandle};

use crate::handler::{Handler, SubscriptionActions};
use crate::{Runtime, RuntimeError};

/// Subscription actions against the runtime's channel.
pub(crate) struct ChannelActions<'a, B: BrokerAdapter> {
    runtime: &'a Runtime<B>,
}

impl<'a, B: BrokerAdapter> ChannelActions<'a, B> {
    pub(crate) fn new(runtime: &'a Runtime<B>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl<'a, B: BrokerAdapter> SubscriptionActions for ChannelActions<'a, B> {
    async fn subscribe(&self, handler: &Arc<Handler>) -> Result<ConsumerTag, RuntimeError> {
        let channel = self.runtime.channel().await?;
        channel
            .declare_queue(handler.queue(), handler.options())
            .await?;

        let tag = ConsumerTag::for_queue(handler.queue(), self.runtime.inner.ids.as_ref());
        let stream = channel.consume(handler.queue(), &tag).await?;
        let task = tokio::spawn(consume(
            self.runtime.clone(),
            Arc::clone(handler),
            tag.clone(),
            stream,
        ));
        tokio::spawn(watch(
            self.runtime.clone(),
            handler.queue().to_string(),
            tag.clone(),
            task,
        ));
        Ok(tag)
    }

    async fn unsubscribe(
        &self,
        _handler: &Arc<Handler>,
        tag: &ConsumerTag,
    ) -> Result<(), RuntimeError> {
        let channel = self.runtime.channel().await?;
        channel.cancel(tag).await?;
        Ok(())
    }
}

/// Process one consumer's deliveries in order until the stream ends or a
/// job failure is escalated.
async fn consume<B: BrokerAdapter>(
    runtime: Runtime<B>,
    handler: Arc<Handler>,
    tag: ConsumerTag,
    mut stream: DeliveryStream,
) {
    while let Some(item) = stream.next().await {
        let delivery = match item {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::warn!(consumer_tag = tag.as_str(), error = %e, "consumer stream failed");
                break;
            }
        };
        if let Err(err) = runtime.process(&handler, delivery).await {
            runtime.escalate(err);
            break;
        }
    }
    tracing::debug!(consumer_tag = tag.as_str(), "consumer finished");
}

/// Escalate a consumer task that died without finishing. Its delivery
/// stays unacked, the same as a re-raised job failure.
async fn watch<B: BrokerAdapter>(
    runtime: Runtime<B>,
    queue: String,
    tag: ConsumerTag,
    task: JoinHandle<()>,
) {
    let Err(err) = task.await else {
        return;
    };
    if err.is_cancelled() {
        return;
    }
    tracing::error!(consumer_tag = tag.as_str(), queue = queue.as_str(), "consumer task panicked");
    runtime.escalate(RuntimeError::ConsumerDied {
        queue,
        reason: panic_message(err),
    });
}

fn panic_message(err: JoinError) -> String {
    let panic = err.into_panic();
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panicked".to_string()
    }
}

impl<B: BrokerAdapter> Runtime<B> {
    /// Run one delivery through its handler and settle it.
    ///
    /// Returns an error only when the error policy re-raised a job failure;
    /// the delivery is then left unacknowledged.
    pub(crate) async fn process(
        &self,
        handler: &Handler,
        delivery: Delivery,
    ) -> Result<(), RuntimeError> {
        let queue = handler.queue();
        let decoded = Payload::decode(&delivery.body, delivery.content_type.as_deref());
        let (payload, outcome) = match decoded {
            Ok(payload) => {
                self.log(&format!("received: {queue}({payload})"));
                let outcome = self.work(handler, &payload, &delivery.headers).await;
                (payload, outcome)
            }
            Err(e) => (Payload::Raw(delivery.body.clone()), Err(e.into())),
        };

        let disposition = match outcome {
            Ok(_) => Disposition::Ack,
            Err(err) => {
                let info = handler.info(delivery.redelivered);
                self.decide(err, &info, &payload, &delivery.headers)
                    .map_err(|source| RuntimeError::Job {
                        queue: queue.to_string(),
                        source,
                    })?
            }
        };

        let settled = match disposition {
            Disposition::Ack => delivery.ack().await,
            Disposition::Requeue => delivery.nack(true).await,
        };
        if let Err(e) = settled {
            tracing::warn!(queue = queue.as_str(), error = %e, "failed to settle delivery");
        }

        if self.inner.registry.has_conditional() {
            if let Err(e) = self.check_all().await {
                tracing::warn!(error = %e, "re-check after job failed");
            }
        }
        Ok(())
    }
}
