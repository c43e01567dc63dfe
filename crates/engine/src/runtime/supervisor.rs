// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reacts to out-of-band broker events for one runtime.

use std::sync::Weak;

use jl_adapters::{BrokerAdapter, BrokerEvent};
use tokio::sync::mpsc;

use super::{Inner, Runtime};
use crate::RuntimeError;

/// Runs until the runtime is dropped. Holds only a weak reference between
/// events so an idle supervisor never keeps the runtime alive.
pub(super) async fn run<B: BrokerAdapter>(
    runtime: Weak<Inner<B>>,
    mut events: mpsc::UnboundedReceiver<BrokerEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = runtime.upgrade() else {
            break;
        };
        handle(Runtime { inner }, event).await;
    }
    tracing::debug!("broker event supervisor exiting");
}

async fn handle<B: BrokerAdapter>(runtime: Runtime<B>, event: BrokerEvent) {
    match event {
        BrokerEvent::TransportLost(reason) => {
            if runtime.is_stopped() {
                return;
            }
            tracing::warn!(error = %reason, "broker connection lost, reconnecting");
            let recover = runtime.config().auto_recovery;
            if recover {
                // The consumers went down with the connection. Forget them
                // now, so a check that runs during the outage subscribes on
                // the new connection and recovery leaves it alone.
                runtime.inner.registry.reset();
            }
            let Some(generation) = runtime.inner.connections.reconnect().await else {
                return;
            };
            runtime.log(&format!("recovered: connection generation {generation}"));
            if recover {
                runtime.resubscribe().await;
            }
        }
        BrokerEvent::Fatal(reason) => {
            if runtime.is_stopped() {
                return;
            }
            runtime.inner.connections.abandon().await;
            runtime.escalate(RuntimeError::Fatal(reason));
        }
        BrokerEvent::ChannelError(reason) => {
            tracing::warn!(error = %reason, "channel error");
        }
    }
}
