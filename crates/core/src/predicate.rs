// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activation predicates gating whether a handler stays subscribed

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Decides whether a handler should currently be consuming.
///
/// Evaluated on every registry re-check, so implementations must be cheap
/// and free of side effects.
pub trait ActivationPredicate: Send + Sync {
    fn should_subscribe(&self) -> bool;
}

impl<F> ActivationPredicate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn should_subscribe(&self) -> bool {
        self()
    }
}

/// Predicate that is always true.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl ActivationPredicate for Always {
    fn should_subscribe(&self) -> bool {
        true
    }
}

/// Shared on/off switch usable as a predicate.
///
/// Clones observe the same flag, so one copy can be handed to a handler
/// while another is flipped by application code or by another job.
#[derive(Debug, Clone, Default)]
pub struct Toggle {
    flag: Arc<AtomicBool>,
}

impl Toggle {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, on: bool) {
        self.flag.store(on, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl ActivationPredicate for Toggle {
    fn should_subscribe(&self) -> bool {
        self.get()
    }
}

#[cfg(test)]
#[path = "predicate_tests.rs"]
mod tests;
