// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager: one lazily opened broker connection, reopened after
//! transport loss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use jl_adapters::{BrokerAdapter, BrokerConnection, EventSink};
use jl_core::AmqpConfig;
use tokio::sync::{watch, Mutex};

use crate::RuntimeError;

/// Lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Closed,
    Open,
    Reconnecting,
}

pub(crate) struct ConnectionManager<B: BrokerAdapter> {
    broker: B,
    config: AmqpConfig,
    reconnect_delay: Duration,
    events: EventSink,
    slot: Mutex<Option<B::Connection>>,
    generation: AtomicU64,
    status: parking_lot::Mutex<ConnectionStatus>,
    shutdown: watch::Sender<bool>,
    /// Bumped whenever the slot is refilled or emptied
    replaced: watch::Sender<()>,
}

impl<B: BrokerAdapter> ConnectionManager<B> {
    pub(crate) fn new(
        broker: B,
        config: AmqpConfig,
        reconnect_delay: Duration,
        events: EventSink,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (replaced, _) = watch::channel(());
        Self {
            broker,
            config,
            reconnect_delay,
            events,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            status: parking_lot::Mutex::new(ConnectionStatus::Closed),
            shutdown,
            replaced,
        }
    }

    pub(crate) fn config(&self) -> &AmqpConfig {
        &self.config
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }

    /// Record a fresh connection and return its generation
    fn install(&self, slot: &mut Option<B::Connection>, conn: B::Connection) -> u64 {
        *slot = Some(conn);
        self.set_status(ConnectionStatus::Open);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.replaced.send_replace(());
        generation
    }

    /// An open connection and its generation, connecting first if needed.
    ///
    /// Only the first connect (or one after a fatal error) happens here. A
    /// connection that was lost is replaced by [`Self::reconnect`], and
    /// callers wait for that instead of seeing the outage: the reconnect
    /// loop holds the slot until it succeeds.
    pub(crate) async fn connection(&self) -> Result<(B::Connection, u64), RuntimeError> {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            if self.is_shut_down() {
                return Err(RuntimeError::Stopped);
            }
            let mut slot = self.slot.lock().await;
            if self.is_shut_down() {
                return Err(RuntimeError::Stopped);
            }
            if let Some(conn) = slot.as_ref().filter(|c| c.is_open()) {
                return Ok((conn.clone(), self.generation()));
            }

            if slot.is_some() {
                // Lost, and the supervisor has not taken the slot yet
                let mut replaced = self.replaced.subscribe();
                drop(slot);
                tokio::select! {
                    _ = replaced.changed() => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            let conn = self.broker.connect(&self.config, self.events.clone()).await?;
            let generation = self.install(&mut slot, conn.clone());
            tracing::info!(generation, "broker connection open");
            return Ok((conn, generation));
        }
    }

    /// Replace a lost connection, retrying every `reconnect_delay` until it
    /// succeeds or the manager is closed. Returns the new generation, or
    /// `None` if nothing needed doing.
    pub(crate) async fn reconnect(&self) -> Option<u64> {
        let mut shutdown = self.shutdown.subscribe();
        let mut slot = self.slot.lock().await;
        if self.is_shut_down() || slot.as_ref().is_some_and(|c| c.is_open()) {
            return None;
        }
        self.set_status(ConnectionStatus::Reconnecting);

        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => {
                    self.set_status(ConnectionStatus::Closed);
                    return None;
                }
            }
            if self.is_shut_down() {
                self.set_status(ConnectionStatus::Closed);
                return None;
            }

            attempt += 1;
            match self.broker.connect(&self.config, self.events.clone()).await {
                Ok(conn) => {
                    let generation = self.install(&mut slot, conn);
                    tracing::info!(generation, attempt, "connection recovered");
                    return Some(generation);
                }
                Err(e) => tracing::warn!(attempt, error = %e, "reconnect failed"),
            }
        }
    }

    /// Stop using the connection after a fatal error, without closing it.
    pub(crate) async fn abandon(&self) {
        *self.slot.lock().await = None;
        self.set_status(ConnectionStatus::Closed);
        self.replaced.send_replace(());
    }

    /// Close the connection. No reconnect is attempted afterwards.
    pub(crate) async fn close(&self) {
        self.shutdown.send_replace(true);
        let mut slot = self.slot.lock().await;
        self.set_status(ConnectionStatus::Closed);
        let Some(conn) = slot.take() else {
            return;
        };
        if conn.is_open() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "connection close failed");
            }
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Number of successful connects so far
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
