// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jl_adapters::FakeBroker;
use jl_core::{ConsumerTag, QueueName, QueueOptions, SequentialIdGen, Toggle};
use parking_lot::Mutex;
use serde_json::Value;

use crate::handler::{Handler, SubscriptionActions};
use crate::{Runtime, RuntimeConfig, RuntimeError};

/// Runtime type used throughout the engine tests
pub(crate) type TestRuntime = Runtime<FakeBroker>;

/// A subscription change requested of [`RecordingActions`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Queue name
    Subscribe(String),
    /// Consumer tag
    Unsubscribe(String),
}

/// Subscription actions that only record what they were asked to do.
///
/// Consumer tags are `"<queue>.<n>"` with `n` counting from 1.
pub(crate) struct RecordingActions {
    calls: Mutex<Vec<Action>>,
    ids: SequentialIdGen,
    fail_next: AtomicBool,
}

impl RecordingActions {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ids: SequentialIdGen::new(),
            fail_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Action> {
        self.calls.lock().clone()
    }

    /// Make the next subscribe or unsubscribe fail without being recorded
    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), RuntimeError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RuntimeError::Fatal("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionActions for RecordingActions {
    async fn subscribe(&self, handler: &Arc<Handler>) -> Result<ConsumerTag, RuntimeError> {
        self.check_failure()?;
        self.calls
            .lock()
            .push(Action::Subscribe(handler.queue().to_string()));
        Ok(ConsumerTag::for_queue(handler.queue(), &self.ids))
    }

    async fn unsubscribe(
        &self,
        _handler: &Arc<Handler>,
        tag: &ConsumerTag,
    ) -> Result<(), RuntimeError> {
        self.check_failure()?;
        self.calls.lock().push(Action::Unsubscribe(tag.to_string()));
        Ok(())
    }
}

/// A steady handler whose callback returns `null`
#[track_caller]
pub(crate) fn handler(queue: &str) -> Arc<Handler> {
    Arc::new(Handler::new(
        QueueName::new(queue).unwrap(),
        QueueOptions::default(),
        None,
        Location::caller(),
        |_, _| async { Ok(Value::Null) },
    ))
}

/// A conditional handler gated by `toggle`
#[track_caller]
pub(crate) fn toggled_handler(queue: &str, toggle: &Toggle) -> Arc<Handler> {
    Arc::new(Handler::new(
        QueueName::new(queue).unwrap(),
        QueueOptions::default(),
        Some(Arc::new(toggle.clone())),
        Location::caller(),
        |_, _| async { Ok(Value::Null) },
    ))
}

/// Runtime on `broker` with sequential consumer tags and a short
/// reconnect delay
pub(crate) fn runtime(broker: &FakeBroker) -> TestRuntime {
    let config = RuntimeConfig {
        reconnect_delay: Duration::from_millis(5),
        ..RuntimeConfig::default()
    };
    Runtime::with_ids(broker.clone(), config, SequentialIdGen::new()).unwrap()
}

/// Install a logger on `runtime` that records every message
pub(crate) fn record_log(runtime: &TestRuntime) -> Arc<Mutex<Vec<String>>> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    runtime.set_logger(move |msg| sink.lock().push(msg.to_string()));
    lines
}

/// Poll `condition` until it holds, failing the test after a second
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 1s"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

