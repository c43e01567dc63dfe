// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publishing jobs and registering job handlers.
//!
//! `enqueue` is `async_enqueue` followed by waiting on the returned
//! [`PublishHandle`]; there is a single publish path.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use jl_adapters::{BrokerAdapter, BrokerChannel, OutgoingMessage};
use jl_core::{
    ActivationPredicate, Envelope, Headers, Hop, Payload, QueueName, QueueOptions, Route,
    JSON_CONTENT_TYPE,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::handler::Handler;
use crate::{EnqueueError, JobError, Runtime, RuntimeError};

/// An in-flight publish. Resolves once the broker confirms or refuses it.
#[must_use = "a publish handle does nothing unless awaited or given a callback"]
pub struct PublishHandle {
    queue: QueueName,
    rx: oneshot::Receiver<Result<(), EnqueueError>>,
}

impl PublishHandle {
    /// Queue the job was published to
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Run `callback` with the outcome once the broker has answered.
    pub fn on_confirm<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<(), EnqueueError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }
}

impl Future for PublishHandle {
    type Output = Result<(), EnqueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EnqueueError::Dropped)))
    }
}

impl fmt::Debug for PublishHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishHandle")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Options for [`Runtime::register_job`]
#[derive(Clone, Default)]
pub struct JobOptions {
    predicate: Option<Arc<dyn ActivationPredicate>>,
    queue: QueueOptions,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consume while `predicate` holds; re-evaluated after every job.
    pub fn when(mut self, predicate: impl ActivationPredicate + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.queue.durable = durable;
        self
    }

    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.queue.auto_delete = auto_delete;
        self
    }
}

impl fmt::Debug for JobOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOptions")
            .field("conditional", &self.predicate.is_some())
            .field("queue", &self.queue)
            .finish()
    }
}

impl<B: BrokerAdapter> Runtime<B> {
    /// Publish a job and wait for the broker to confirm it.
    pub async fn enqueue(
        &self,
        route: impl Into<Route>,
        data: Value,
        headers: Headers,
    ) -> Result<(), EnqueueError> {
        self.async_enqueue(route, data, headers)?.await
    }

    /// Start publishing a job and return without waiting.
    ///
    /// A workflow route publishes to its first queue with the remaining
    /// queues embedded as `next_job`. Routing and encoding errors are
    /// returned immediately; broker failures resolve the handle.
    pub fn async_enqueue(
        &self,
        route: impl Into<Route>,
        data: Value,
        headers: Headers,
    ) -> Result<PublishHandle, EnqueueError> {
        let (queue, data) = route.into().prepare(data)?;
        let envelope = Envelope::new(queue.clone(), data, headers);
        let body = envelope.body()?;
        let tokio = tokio::runtime::Handle::try_current().map_err(|_| EnqueueError::NoRuntime)?;

        let (tx, rx) = oneshot::channel();
        let runtime = self.clone();
        tokio.spawn(async move {
            let _ = tx.send(runtime.publish(envelope, body).await);
        });
        Ok(PublishHandle { queue, rx })
    }

    async fn publish(&self, envelope: Envelope, body: Vec<u8>) -> Result<(), EnqueueError> {
        let channel = self.channel().await?;
        let message = OutgoingMessage {
            body,
            content_type: JSON_CONTENT_TYPE.to_string(),
            headers: envelope.headers.clone(),
            mandatory: true,
        };
        channel.publish(&envelope.queue, message).await?.await?;
        self.log(&format!("enqueue: {}({})", envelope.queue, envelope.data));
        Ok(())
    }

    /// Register a handler for `queue`. Jobs start flowing once the runtime
    /// is started.
    #[track_caller]
    pub fn register_job<F, Fut>(
        &self,
        queue: impl Into<String>,
        options: JobOptions,
        callback: F,
    ) -> Result<Arc<Handler>, RuntimeError>
    where
        F: Fn(Payload, Headers) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let location = Location::caller();
        let queue = queue.into();
        let queue = QueueName::new(queue.clone()).ok_or(RuntimeError::InvalidQueue(queue))?;
        let handler = Arc::new(Handler::new(
            queue,
            options.queue,
            options.predicate,
            location,
            callback,
        ));
        tracing::debug!(
            queue = handler.queue().as_str(),
            kind = ?handler.kind(),
            file = location.file(),
            "job registered"
        );
        self.inner.registry.push(Arc::clone(&handler));
        Ok(handler)
    }

    /// Register a steady handler on a durable queue.
    #[track_caller]
    pub fn job<F, Fut>(
        &self,
        queue: impl Into<String>,
        callback: F,
    ) -> Result<Arc<Handler>, RuntimeError>
    where
        F: Fn(Payload, Headers) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register_job(queue, JobOptions::default(), callback)
    }

    /// Call the handler registered for `queue` directly, without the broker.
    ///
    /// A failure goes through the error policy. Returns the job's result,
    /// or `None` when the policy absorbed a failure.
    pub async fn run_handler(
        &self,
        queue: &str,
        payload: impl Into<Payload>,
        headers: Headers,
    ) -> Result<Option<Value>, JobError> {
        let handler = self
            .inner
            .registry
            .find(queue)
            .ok_or_else(|| JobError::UnknownHandler(queue.to_string()))?;
        let payload = payload.into();

        match handler.invoke(payload.clone(), headers.clone()).await {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                let info = handler.info(false);
                self.decide(JobError::Callback(e), &info, &payload, &headers)
                    .map(|_| None)
            }
        }
    }

    /// Invoke the callback, then forward its result if the payload names a
    /// next job.
    pub(crate) async fn work(
        &self,
        handler: &Handler,
        payload: &Payload,
        headers: &Headers,
    ) -> Result<Value, JobError> {
        let result = handler
            .invoke(payload.clone(), headers.clone())
            .await
            .map_err(JobError::Callback)?;

        let hop = Hop::after(payload, result.clone()).map_err(EnqueueError::from)?;
        if let Some(hop) = hop {
            self.enqueue(hop.queue, hop.data, headers.clone()).await?;
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "work_queue_tests.rs"]
mod tests;
