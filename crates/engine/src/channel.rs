// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel manager: the single channel on the current connection

use jl_adapters::{BrokerAdapter, BrokerChannel, BrokerConnection, ChannelOf};
use tokio::sync::Mutex;

use crate::connection::ConnectionManager;
use crate::RuntimeError;

pub(crate) struct ChannelManager<B: BrokerAdapter> {
    prefetch: u16,
    current: Mutex<Option<(ChannelOf<B>, u64)>>,
}

impl<B: BrokerAdapter> ChannelManager<B> {
    pub(crate) fn new(prefetch: u16) -> Self {
        Self {
            prefetch,
            current: Mutex::new(None),
        }
    }

    /// The open channel, opening a new one when the previous channel closed
    /// or belongs to an older connection.
    pub(crate) async fn channel(
        &self,
        connections: &ConnectionManager<B>,
    ) -> Result<ChannelOf<B>, RuntimeError> {
        let (conn, generation) = connections.connection().await?;
        let mut current = self.current.lock().await;
        if let Some((channel, opened_on)) = current.as_ref() {
            if *opened_on == generation && channel.is_open() {
                return Ok(channel.clone());
            }
        }

        let channel = conn.open_channel(self.prefetch).await?;
        tracing::debug!(generation, prefetch = self.prefetch, "channel open");
        *current = Some((channel.clone(), generation));
        Ok(channel)
    }

    pub(crate) async fn close(&self) {
        let Some((channel, _)) = self.current.lock().await.take() else {
            return;
        };
        if channel.is_open() {
            if let Err(e) = channel.close().await {
                tracing::warn!(error = %e, "channel close failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
