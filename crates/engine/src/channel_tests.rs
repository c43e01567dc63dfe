// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jl_adapters::{BrokerCall, FakeBroker};
use jl_core::AmqpConfig;
use std::time::Duration;
use tokio::sync::mpsc;

fn managers(broker: &FakeBroker) -> (ConnectionManager<FakeBroker>, ChannelManager<FakeBroker>) {
    let (tx, _rx) = mpsc::unbounded_channel();
    (
        ConnectionManager::new(
            broker.clone(),
            AmqpConfig::default(),
            Duration::from_millis(5),
            tx,
        ),
        ChannelManager::new(3),
    )
}

fn channel_opens(broker: &FakeBroker) -> Vec<u16> {
    broker
        .calls()
        .iter()
        .filter_map(|c| match c {
            BrokerCall::OpenChannel { prefetch } => Some(*prefetch),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn opens_one_channel_with_prefetch() {
    let broker = FakeBroker::new();
    let (connections, channels) = managers(&broker);

    let first = channels.channel(&connections).await.unwrap();
    let second = channels.channel(&connections).await.unwrap();

    assert!(first.is_open());
    assert!(second.is_open());
    assert_eq!(channel_opens(&broker), vec![3]);
}

#[tokio::test]
async fn reopens_after_channel_closes() {
    let broker = FakeBroker::new();
    let (connections, channels) = managers(&broker);
    let first = channels.channel(&connections).await.unwrap();

    first.close().await.unwrap();
    let second = channels.channel(&connections).await.unwrap();

    assert!(second.is_open());
    assert_eq!(channel_opens(&broker).len(), 2);
}

#[tokio::test]
async fn reopens_on_new_connection_generation() {
    let broker = FakeBroker::new();
    let (connections, channels) = managers(&broker);
    channels.channel(&connections).await.unwrap();

    broker.simulate_connection_loss();
    connections.reconnect().await.unwrap();
    let channel = channels.channel(&connections).await.unwrap();

    assert!(channel.is_open());
    assert_eq!(channel_opens(&broker).len(), 2);
}

#[tokio::test]
async fn close_closes_open_channel_once() {
    let broker = FakeBroker::new();
    let (connections, channels) = managers(&broker);
    channels.channel(&connections).await.unwrap();

    channels.close().await;
    channels.close().await;

    let closes = broker
        .calls()
        .iter()
        .filter(|c| matches!(c, BrokerCall::CloseChannel))
        .count();
    assert_eq!(closes, 1);
}
