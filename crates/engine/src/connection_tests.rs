// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jl_adapters::{BrokerCall, BrokerEvent, FakeBroker};
use std::sync::Arc;
use tokio::sync::mpsc;

fn manager(broker: &FakeBroker) -> (ConnectionManager<FakeBroker>, mpsc::UnboundedReceiver<BrokerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        broker.clone(),
        AmqpConfig::default(),
        Duration::from_millis(5),
        tx,
    );
    (manager, rx)
}

fn connects(broker: &FakeBroker) -> usize {
    broker
        .calls()
        .iter()
        .filter(|c| matches!(c, BrokerCall::Connect { .. }))
        .count()
}

async fn wait_for_status(manager: &ConnectionManager<FakeBroker>, status: ConnectionStatus) {
    while manager.status() != status {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn connects_lazily_and_reuses_open_connection() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    assert_eq!(manager.status(), ConnectionStatus::Closed);
    assert!(broker.calls().is_empty());

    let (_, first) = manager.connection().await.unwrap();
    let (_, second) = manager.connection().await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 1);
    assert_eq!(connects(&broker), 1);
    assert_eq!(manager.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn initial_connect_failure_is_returned() {
    let broker = FakeBroker::new();
    broker.fail_next_connects(1);
    let (manager, _rx) = manager(&broker);

    let err = manager.connection().await.err();

    assert!(matches!(err, Some(RuntimeError::Broker(_))));
    assert_eq!(manager.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn reconnect_retries_until_broker_accepts() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    manager.connection().await.unwrap();

    broker.simulate_connection_loss();
    broker.fail_next_connects(2);
    let generation = manager.reconnect().await;

    assert_eq!(generation, Some(2));
    assert_eq!(connects(&broker), 4);
    assert_eq!(manager.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn reconnect_is_a_no_op_while_connection_is_open() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    manager.connection().await.unwrap();

    assert_eq!(manager.reconnect().await, None);
    assert_eq!(connects(&broker), 1);
}

#[tokio::test]
async fn callers_wait_for_reconnect() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    let manager = Arc::new(manager);
    manager.connection().await.unwrap();

    broker.simulate_connection_loss();
    broker.fail_next_connects(3);
    let reconnecting = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.reconnect().await })
    };
    wait_for_status(&manager, ConnectionStatus::Reconnecting).await;

    let (conn, generation) = manager.connection().await.unwrap();
    assert!(conn.is_open());
    assert_eq!(generation, 2);
    assert_eq!(reconnecting.await.unwrap(), Some(2));
}

#[tokio::test]
async fn close_prevents_further_connections() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    manager.connection().await.unwrap();

    manager.close().await;

    assert!(!broker.is_connected());
    assert_eq!(manager.status(), ConnectionStatus::Closed);
    assert!(matches!(
        manager.connection().await,
        Err(RuntimeError::Stopped)
    ));
    assert_eq!(manager.reconnect().await, None);
}

#[tokio::test]
async fn close_interrupts_reconnect_loop() {
    let broker = FakeBroker::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    let manager = Arc::new(ConnectionManager::new(
        broker.clone(),
        AmqpConfig::default(),
        Duration::from_secs(3600),
        tx,
    ));
    manager.connection().await.unwrap();
    broker.simulate_connection_loss();

    let reconnecting = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.reconnect().await })
    };
    wait_for_status(&manager, ConnectionStatus::Reconnecting).await;
    manager.close().await;

    assert_eq!(reconnecting.await.unwrap(), None);
    assert_eq!(manager.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn lost_connection_is_left_to_the_reconnect_loop() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    let manager = Arc::new(manager);
    manager.connection().await.unwrap();

    broker.simulate_connection_loss();
    broker.fail_next_connects(1);
    let caller = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.connection().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!caller.is_finished());
    assert_eq!(connects(&broker), 1);

    assert_eq!(manager.reconnect().await, Some(2));
    let (conn, generation) = caller.await.unwrap().unwrap();

    assert!(conn.is_open());
    assert_eq!(generation, 2);
    assert_eq!(connects(&broker), 3);
}

#[tokio::test]
async fn close_releases_callers_waiting_on_a_lost_connection() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    let manager = Arc::new(manager);
    manager.connection().await.unwrap();
    broker.simulate_connection_loss();

    let caller = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.connection().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    manager.close().await;

    assert!(matches!(
        caller.await.unwrap(),
        Err(RuntimeError::Stopped)
    ));
}

#[tokio::test]
async fn abandoned_connection_is_reopened_on_demand() {
    let broker = FakeBroker::new();
    let (manager, _rx) = manager(&broker);
    manager.connection().await.unwrap();

    broker.simulate_connection_loss();
    manager.abandon().await;
    let (_, generation) = manager.connection().await.unwrap();

    assert_eq!(generation, 2);
    assert_eq!(connects(&broker), 2);
}
