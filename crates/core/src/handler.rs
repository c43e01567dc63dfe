// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler state and queue options shared by the engine and adapters

use serde::{Deserialize, Serialize};

/// Whether a handler currently holds a consumer on its queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    #[default]
    Off,
    On,
}

impl ActivationState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
        }
    }
}

/// How a handler decides to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Subscribes once at startup and stays subscribed
    Steady,
    /// Follows its activation predicate on every re-check
    Conditional,
}

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Survives a broker restart
    pub durable: bool,
    /// Deleted by the broker once the last consumer goes away
    pub auto_delete: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            durable: true,
            auto_delete: false,
        }
    }
}

/// Outcome of one activation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Subscribed,
    Unsubscribed,
    Unchanged,
}

/// What to do with a delivery whose job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the delivery from the queue
    Ack,
    /// Hand the delivery back to the broker for redelivery
    Requeue,
}
