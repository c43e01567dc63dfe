// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-queue handler and its activation state machine.
//!
//! A handler is `Off` until `check` (or `start`) subscribes it. `check`
//! re-evaluates the activation predicate each time and only calls the
//! subscribe or unsubscribe action on an actual Off→On or On→Off change,
//! so repeated checks with an unchanged predicate issue no broker calls.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use jl_core::{
    ActivationPredicate, ActivationState, ConsumerTag, HandlerKind, Headers, Payload, QueueName,
    QueueOptions, Transition,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::policy::HandlerInfo;
use crate::RuntimeError;

/// Future returned by a job callback
pub type JobFuture = BoxFuture<'static, anyhow::Result<Value>>;

type Callback = dyn Fn(Payload, Headers) -> JobFuture + Send + Sync;

/// Broker side of a subscription change.
#[async_trait]
pub trait SubscriptionActions: Send + Sync {
    /// Start consuming for `handler`, returning the consumer tag
    async fn subscribe(&self, handler: &Arc<Handler>) -> Result<ConsumerTag, RuntimeError>;

    /// Stop the consumer identified by `tag`
    async fn unsubscribe(&self, handler: &Arc<Handler>, tag: &ConsumerTag)
        -> Result<(), RuntimeError>;
}

#[derive(Default)]
struct HandlerState {
    activation: ActivationState,
    consumer_tag: Option<ConsumerTag>,
}

pub struct Handler {
    queue: QueueName,
    options: QueueOptions,
    kind: HandlerKind,
    predicate: Arc<dyn ActivationPredicate>,
    callback: Arc<Callback>,
    location: &'static Location<'static>,
    state: Mutex<HandlerState>,
    disabled: AtomicBool,
}

impl Handler {
    pub(crate) fn new<F, Fut>(
        queue: QueueName,
        options: QueueOptions,
        predicate: Option<Arc<dyn ActivationPredicate>>,
        location: &'static Location<'static>,
        callback: F,
    ) -> Self
    where
        F: Fn(Payload, Headers) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let (kind, predicate) = match predicate {
            Some(p) => (HandlerKind::Conditional, p),
            None => (
                HandlerKind::Steady,
                Arc::new(jl_core::Always) as Arc<dyn ActivationPredicate>,
            ),
        };
        Self {
            queue,
            options,
            kind,
            predicate,
            callback: Arc::new(move |payload, headers| callback(payload, headers).boxed()),
            location,
            state: Mutex::new(HandlerState::default()),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn options(&self) -> QueueOptions {
        self.options
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn state(&self) -> ActivationState {
        self.state.lock().activation
    }

    pub fn consumer_tag(&self) -> Option<ConsumerTag> {
        self.state.lock().consumer_tag.clone()
    }

    /// Source location of the registration
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// Make the predicate evaluate false from now on; the next `check`
    /// unsubscribes.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn should_subscribe(&self) -> bool {
        !self.is_disabled() && self.predicate.should_subscribe()
    }

    pub(crate) fn invoke(&self, payload: Payload, headers: Headers) -> JobFuture {
        (self.callback)(payload, headers)
    }

    pub(crate) fn info(&self, redelivered: bool) -> HandlerInfo {
        HandlerInfo {
            queue: self.queue.clone(),
            kind: self.kind,
            consumer_tag: self.consumer_tag(),
            redelivered,
            location: self.location,
        }
    }

    /// Forget any subscription, as after the connection was replaced.
    pub(crate) fn reset(&self) {
        *self.state.lock() = HandlerState::default();
    }

    /// Re-evaluate the predicate and subscribe or unsubscribe on a change.
    ///
    /// If the action fails the state is left as it was.
    pub async fn check(
        self: &Arc<Self>,
        actions: &dyn SubscriptionActions,
    ) -> Result<Transition, RuntimeError> {
        let wanted = self.should_subscribe();
        let (activation, tag) = {
            let state = self.state.lock();
            (state.activation, state.consumer_tag.clone())
        };

        match (wanted, activation) {
            (true, ActivationState::Off) => self.subscribe(actions).await,
            (false, ActivationState::On) => {
                if let Some(tag) = &tag {
                    actions.unsubscribe(self, tag).await?;
                }
                *self.state.lock() = HandlerState::default();
                tracing::info!(queue = self.queue.as_str(), "unsubscribed");
                Ok(Transition::Unsubscribed)
            }
            _ => Ok(Transition::Unchanged),
        }
    }

    /// Subscribe once, regardless of the predicate. No-op when already on.
    pub async fn start(
        self: &Arc<Self>,
        actions: &dyn SubscriptionActions,
    ) -> Result<Transition, RuntimeError> {
        if self.state().is_on() || self.is_disabled() {
            return Ok(Transition::Unchanged);
        }
        self.subscribe(actions).await
    }

    async fn subscribe(
        self: &Arc<Self>,
        actions: &dyn SubscriptionActions,
    ) -> Result<Transition, RuntimeError> {
        let tag = actions.subscribe(self).await?;
        tracing::info!(
            queue = self.queue.as_str(),
            consumer_tag = tag.as_str(),
            "subscribed"
        );
        *self.state.lock() = HandlerState {
            activation: ActivationState::On,
            consumer_tag: Some(tag),
        };
        Ok(Transition::Subscribed)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("queue", &self.queue)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<handler queue={} on={}>", self.queue, self.state().is_on())
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
