// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use jl_core::{AmqpConfig, ConsumerTag, Headers, QueueName, QueueOptions, JSON_CONTENT_TYPE};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    Acker, BrokerAdapter, BrokerChannel, BrokerConnection, BrokerError, BrokerEvent, Delivery,
    DeliveryStream, EventSink, OutgoingMessage, PublishConfirm,
};

/// Recorded broker call
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    Connect { url: String },
    OpenChannel { prefetch: u16 },
    DeclareQueue { queue: String, options: QueueOptions },
    Consume { queue: String, tag: String },
    Cancel { tag: String },
    Publish { queue: String, message: OutgoingMessage },
    Ack { queue: String, delivery_tag: u64 },
    Nack { queue: String, delivery_tag: u64, requeue: bool },
    CloseChannel,
    CloseConnection,
}

#[derive(Clone)]
struct Stored {
    message: OutgoingMessage,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    options: QueueOptions,
    ready: VecDeque<Stored>,
}

struct Consumer {
    tag: ConsumerTag,
    queue: QueueName,
    channel: u64,
    prefetch: u16,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Result<Delivery, BrokerError>>,
}

impl Consumer {
    fn has_capacity(&self) -> bool {
        self.prefetch == 0 || self.in_flight < usize::from(self.prefetch)
    }
}

struct Unacked {
    queue: QueueName,
    tag: ConsumerTag,
    channel: u64,
    stored: Stored,
}

struct ChannelState {
    generation: u64,
    prefetch: u16,
    open: bool,
}

struct FakeBrokerState {
    calls: Vec<BrokerCall>,
    queues: HashMap<QueueName, QueueState>,
    consumers: Vec<Consumer>,
    unacked: HashMap<u64, Unacked>,
    published: Vec<(QueueName, OutgoingMessage)>,
    channels: HashMap<u64, ChannelState>,
    next_channel: u64,
    next_delivery_tag: u64,
    generation: u64,
    connected: bool,
    events: Option<EventSink>,
    failing_connects: usize,
    reject_publishes: bool,
}

/// Fake broker adapter for testing.
///
/// Behaves like a single broker with the default exchange: publishes route
/// to declared queues, consumers receive deliveries up to their prefetch
/// limit, and unacknowledged deliveries return to their queue when their
/// channel or connection goes away.
#[derive(Clone)]
pub struct FakeBroker {
    inner: Arc<Mutex<FakeBrokerState>>,
}

impl Default for FakeBroker {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBrokerState {
                calls: Vec::new(),
                queues: HashMap::new(),
                consumers: Vec::new(),
                unacked: HashMap::new(),
                published: Vec::new(),
                channels: HashMap::new(),
                next_channel: 0,
                next_delivery_tag: 0,
                generation: 0,
                connected: false,
                events: None,
                failing_connects: 0,
                reject_publishes: false,
            })),
        }
    }
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.inner.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Every message routed to a queue, in publish order
    pub fn published(&self) -> Vec<(QueueName, OutgoingMessage)> {
        self.inner.lock().published.clone()
    }

    /// JSON bodies of everything routed to `queue`
    pub fn published_to(&self, queue: &str) -> Vec<Value> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|(q, _)| q == queue)
            .filter_map(|(_, m)| serde_json::from_slice(&m.body).ok())
            .collect()
    }

    /// Create a queue as if another client had declared it
    pub fn declare(&self, queue: &str) {
        if let Some(name) = QueueName::new(queue) {
            self.inner.lock().queues.entry(name).or_default();
        }
    }

    /// Options the queue was declared with
    pub fn queue_options(&self, queue: &str) -> Option<QueueOptions> {
        self.inner.lock().queues.get(queue).map(|q| q.options)
    }

    /// Messages waiting in `queue` for a consumer
    pub fn ready(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(queue)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Deliveries handed out but not yet settled
    pub fn unacked(&self) -> usize {
        self.inner.lock().unacked.len()
    }

    /// Active consumers on `queue`
    pub fn consumer_count(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .consumers
            .iter()
            .filter(|c| c.queue == queue)
            .count()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Number of successful connects so far
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Make the next `n` connection attempts fail
    pub fn fail_next_connects(&self, n: usize) {
        self.inner.lock().failing_connects = n;
    }

    /// Make the broker nack every subsequent publish
    pub fn reject_publishes(&self, reject: bool) {
        self.inner.lock().reject_publishes = reject;
    }

    /// Inject a JSON job as if another producer had published it
    pub fn deliver(&self, queue: &str, data: Value, headers: Headers) {
        let Some(name) = QueueName::new(queue) else {
            return;
        };
        let message = OutgoingMessage {
            body: data.to_string().into_bytes(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            headers,
            mandatory: false,
        };
        let mut state = self.inner.lock();
        state
            .queues
            .entry(name)
            .or_default()
            .ready
            .push_back(Stored {
                message,
                redelivered: false,
            });
        self.dispatch(&mut state);
    }

    /// Drop the connection as a network failure would
    pub fn simulate_connection_loss(&self) {
        let mut state = self.inner.lock();
        self.drop_connection(&mut state);
        if let Some(events) = &state.events {
            let _ = events.send(BrokerEvent::TransportLost("connection reset by peer".into()));
        }
    }

    /// Close the connection with a protocol error
    pub fn simulate_fatal(&self, reason: &str) {
        let mut state = self.inner.lock();
        self.drop_connection(&mut state);
        if let Some(events) = &state.events {
            let _ = events.send(BrokerEvent::Fatal(reason.to_string()));
        }
    }

    /// Report a channel-level error without closing anything
    pub fn simulate_channel_error(&self, reason: &str) {
        let state = self.inner.lock();
        if let Some(events) = &state.events {
            let _ = events.send(BrokerEvent::ChannelError(reason.to_string()));
        }
    }

    fn drop_connection(&self, state: &mut FakeBrokerState) {
        state.connected = false;
        let open: Vec<u64> = state
            .channels
            .iter()
            .filter(|(_, ch)| ch.open)
            .map(|(id, _)| *id)
            .collect();
        for id in open {
            self.drop_channel(state, id);
        }
    }

    fn drop_channel(&self, state: &mut FakeBrokerState, id: u64) {
        if let Some(channel) = state.channels.get_mut(&id) {
            channel.open = false;
        }
        state.consumers.retain(|c| c.channel != id);

        let mut returned: Vec<u64> = state
            .unacked
            .iter()
            .filter(|(_, u)| u.channel == id)
            .map(|(tag, _)| *tag)
            .collect();
        // Requeued deliveries go back in their original order, ahead of newer work
        returned.sort_unstable_by(|a, b| b.cmp(a));
        for tag in returned {
            let Some(u) = state.unacked.remove(&tag) else {
                continue;
            };
            state
                .queues
                .entry(u.queue)
                .or_default()
                .ready
                .push_front(Stored {
                    redelivered: true,
                    ..u.stored
                });
        }
        self.dispatch(state);
    }

    fn dispatch(&self, state: &mut FakeBrokerState) {
        loop {
            let mut delivered = false;
            for index in 0..state.consumers.len() {
                if !state.consumers[index].has_capacity() {
                    continue;
                }
                let queue_name = state.consumers[index].queue.clone();
                let Some(stored) = state
                    .queues
                    .get_mut(&queue_name)
                    .and_then(|q| q.ready.pop_front())
                else {
                    continue;
                };

                state.next_delivery_tag += 1;
                let delivery_tag = state.next_delivery_tag;
                let consumer = &mut state.consumers[index];
                consumer.in_flight += 1;

                let delivery = Delivery::new(
                    delivery_tag,
                    queue_name.as_str(),
                    stored.message.body.clone(),
                    Some(stored.message.content_type.clone()),
                    stored.message.headers.clone(),
                    Box::new(FakeAcker {
                        broker: self.clone(),
                        queue: queue_name.clone(),
                        delivery_tag,
                    }),
                )
                .redelivered(stored.redelivered);
                let _ = consumer.tx.send(Ok(delivery));

                let unacked = Unacked {
                    queue: queue_name,
                    tag: consumer.tag.clone(),
                    channel: consumer.channel,
                    stored,
                };
                state.unacked.insert(delivery_tag, unacked);
                delivered = true;
            }
            if !delivered {
                break;
            }
        }
    }

    fn settle(&self, queue: &QueueName, delivery_tag: u64, outcome: Settle) -> Result<(), BrokerError> {
        let mut state = self.inner.lock();
        state.calls.push(match outcome {
            Settle::Ack => BrokerCall::Ack {
                queue: queue.to_string(),
                delivery_tag,
            },
            Settle::Nack { requeue } => BrokerCall::Nack {
                queue: queue.to_string(),
                delivery_tag,
                requeue,
            },
        });

        let Some(unacked) = state.unacked.remove(&delivery_tag) else {
            return Err(BrokerError::Closed("channel"));
        };
        if let Some(consumer) = state.consumers.iter_mut().find(|c| c.tag == unacked.tag) {
            consumer.in_flight = consumer.in_flight.saturating_sub(1);
        }
        if let Settle::Nack { requeue: true } = outcome {
            state
                .queues
                .entry(unacked.queue)
                .or_default()
                .ready
                .push_front(Stored {
                    redelivered: true,
                    ..unacked.stored
                });
        }
        self.dispatch(&mut state);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Settle {
    Ack,
    Nack { requeue: bool },
}

struct FakeAcker {
    broker: FakeBroker,
    queue: QueueName,
    delivery_tag: u64,
}

#[async_trait]
impl Acker for FakeAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.broker.settle(&self.queue, self.delivery_tag, Settle::Ack)
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.broker
            .settle(&self.queue, self.delivery_tag, Settle::Nack { requeue })
    }
}

#[async_trait]
impl BrokerAdapter for FakeBroker {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        config: &AmqpConfig,
        events: EventSink,
    ) -> Result<FakeConnection, BrokerError> {
        let mut state = self.inner.lock();
        state.calls.push(BrokerCall::Connect {
            url: config.url.clone(),
        });
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(BrokerError::Connect("connection refused".into()));
        }
        state.generation += 1;
        state.connected = true;
        state.events = Some(events);
        Ok(FakeConnection {
            broker: self.clone(),
            generation: state.generation,
        })
    }
}

/// Connection handed out by [`FakeBroker`]
#[derive(Clone)]
pub struct FakeConnection {
    broker: FakeBroker,
    generation: u64,
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    type Channel = FakeChannel;

    fn is_open(&self) -> bool {
        let state = self.broker.inner.lock();
        state.connected && state.generation == self.generation
    }

    async fn open_channel(&self, prefetch: u16) -> Result<FakeChannel, BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::Closed("connection"));
        }
        let mut state = self.broker.inner.lock();
        state.calls.push(BrokerCall::OpenChannel { prefetch });
        state.next_channel += 1;
        let id = state.next_channel;
        state.channels.insert(
            id,
            ChannelState {
                generation: self.generation,
                prefetch,
                open: true,
            },
        );
        Ok(FakeChannel {
            broker: self.broker.clone(),
            id,
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.broker.inner.lock();
        state.calls.push(BrokerCall::CloseConnection);
        if state.generation == self.generation {
            self.broker.drop_connection(&mut state);
        }
        Ok(())
    }
}

/// Channel handed out by [`FakeConnection`]
#[derive(Clone)]
pub struct FakeChannel {
    broker: FakeBroker,
    id: u64,
}

impl FakeChannel {
    fn ensure_open(&self, state: &FakeBrokerState) -> Result<u16, BrokerError> {
        match state.channels.get(&self.id) {
            Some(ch) if ch.open && state.connected && ch.generation == state.generation => {
                Ok(ch.prefetch)
            }
            _ => Err(BrokerError::Closed("channel")),
        }
    }
}

#[async_trait]
impl BrokerChannel for FakeChannel {
    fn is_open(&self) -> bool {
        let state = self.broker.inner.lock();
        self.ensure_open(&state).is_ok()
    }

    async fn declare_queue(
        &self,
        queue: &QueueName,
        options: QueueOptions,
    ) -> Result<(), BrokerError> {
        let mut state = self.broker.inner.lock();
        self.ensure_open(&state)?;
        state.calls.push(BrokerCall::DeclareQueue {
            queue: queue.to_string(),
            options,
        });
        state.queues.entry(queue.clone()).or_default().options = options;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &QueueName,
        tag: &ConsumerTag,
    ) -> Result<DeliveryStream, BrokerError> {
        let mut state = self.broker.inner.lock();
        let prefetch = self.ensure_open(&state)?;
        state.calls.push(BrokerCall::Consume {
            queue: queue.to_string(),
            tag: tag.to_string(),
        });
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::Consume(format!("no queue '{queue}'")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.consumers.push(Consumer {
            tag: tag.clone(),
            queue: queue.clone(),
            channel: self.id,
            prefetch,
            in_flight: 0,
            tx,
        });
        self.broker.dispatch(&mut state);

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError> {
        let mut state = self.broker.inner.lock();
        self.ensure_open(&state)?;
        state.calls.push(BrokerCall::Cancel {
            tag: tag.to_string(),
        });
        state.consumers.retain(|c| &c.tag != tag);
        Ok(())
    }

    async fn publish(
        &self,
        queue: &QueueName,
        message: OutgoingMessage,
    ) -> Result<PublishConfirm, BrokerError> {
        let mut state = self.broker.inner.lock();
        self.ensure_open(&state)?;
        state.calls.push(BrokerCall::Publish {
            queue: queue.to_string(),
            message: message.clone(),
        });

        let name = queue.to_string();
        if state.reject_publishes {
            return Ok(futures::future::ready(Err(BrokerError::Nacked(name))).boxed());
        }
        let Some(target) = state.queues.get_mut(queue) else {
            let outcome = if message.mandatory {
                Err(BrokerError::Unroutable(name))
            } else {
                Ok(())
            };
            return Ok(futures::future::ready(outcome).boxed());
        };

        target.ready.push_back(Stored {
            message: message.clone(),
            redelivered: false,
        });
        state.published.push((queue.clone(), message));
        self.broker.dispatch(&mut state);
        Ok(futures::future::ready(Ok(())).boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.broker.inner.lock();
        state.calls.push(BrokerCall::CloseChannel);
        let open = state.channels.get(&self.id).is_some_and(|ch| ch.open);
        if open {
            self.broker.drop_channel(&mut state, self.id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
