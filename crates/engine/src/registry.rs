// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered set of registered handlers

use std::sync::Arc;

use jl_core::{HandlerKind, Transition};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::handler::{Handler, SubscriptionActions};
use crate::RuntimeError;

/// Handlers in registration order. Grows monotonically.
///
/// Start and check passes hold an async lock so two concurrent passes can
/// never subscribe the same handler twice.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<Vec<Arc<Handler>>>,
    pass: Mutex<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handler: Arc<Handler>) {
        self.handlers.write().push(handler);
    }

    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers.read().clone()
    }

    pub fn has_handlers(&self) -> bool {
        !self.handlers.read().is_empty()
    }

    pub fn has_conditional(&self) -> bool {
        self.handlers
            .read()
            .iter()
            .any(|h| h.kind() == HandlerKind::Conditional)
    }

    /// First handler registered for `queue`
    pub fn find(&self, queue: &str) -> Option<Arc<Handler>> {
        self.handlers
            .read()
            .iter()
            .find(|h| h.queue() == queue)
            .cloned()
    }

    /// Source file of the first registration
    pub fn app_file(&self) -> Option<&'static str> {
        self.handlers.read().first().map(|h| h.location().file())
    }

    /// Mark every handler `Off`, as after the connection was replaced.
    pub fn reset(&self) {
        for handler in self.handlers.read().iter() {
            handler.reset();
        }
    }

    /// Start steady handlers and check conditional ones.
    pub async fn start_all(&self, actions: &dyn SubscriptionActions) -> Result<(), RuntimeError> {
        let _pass = self.pass.lock().await;
        let mut first_error = None;
        for handler in self.handlers() {
            let result = match handler.kind() {
                HandlerKind::Steady => handler.start(actions).await,
                HandlerKind::Conditional => handler.check(actions).await,
            };
            note_failure(&handler, result, &mut first_error);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-evaluate every handler's predicate.
    pub async fn check_all(&self, actions: &dyn SubscriptionActions) -> Result<(), RuntimeError> {
        let _pass = self.pass.lock().await;
        let mut first_error = None;
        for handler in self.handlers() {
            let result = handler.check(actions).await;
            note_failure(&handler, result, &mut first_error);
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// A failing handler does not stop the pass; the first error is kept.
fn note_failure(
    handler: &Handler,
    result: Result<Transition, RuntimeError>,
    first_error: &mut Option<RuntimeError>,
) {
    if let Err(e) = result {
        tracing::warn!(queue = handler.queue().as_str(), error = %e, "handler check failed");
        first_error.get_or_insert(e);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
