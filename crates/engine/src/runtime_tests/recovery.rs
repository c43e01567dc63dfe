// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::JobOptions;
use jl_core::{SequentialIdGen, Toggle};
use std::time::Duration;

#[tokio::test]
async fn transport_loss_resubscribes_each_handler_once() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let log = record_log(&runtime);
    let seen = recording_job(&runtime, "test.work", Value::Null);
    recording_job(&runtime, "other.work", Value::Null);
    runtime.start().await.unwrap();

    broker.simulate_connection_loss();
    eventually(|| consume_calls(&broker).len() == 4).await;

    assert_eq!(
        consume_calls(&broker),
        vec![
            ("test.work".to_string(), "test.work.1".to_string()),
            ("other.work".to_string(), "other.work.2".to_string()),
            ("test.work".to_string(), "test.work.3".to_string()),
            ("other.work".to_string(), "other.work.4".to_string()),
        ]
    );
    assert_eq!(broker.generation(), 2);
    assert_eq!(runtime.connection_generation(), 2);
    assert_eq!(runtime.connection_status(), ConnectionStatus::Open);
    assert_eq!(broker.consumer_count("test.work"), 1);
    assert!(log
        .lock()
        .contains(&"recovered: connection generation 2".to_string()));

    broker.deliver("test.work", json!({"after": "recovery"}), Headers::new());
    eventually(|| seen.lock().len() == 1).await;
}

#[tokio::test]
async fn unacked_delivery_is_redelivered_after_reconnect() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let (release_tx, release_rx) = tokio::sync::watch::channel(false);
    let redelivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&redelivered);
    runtime
        .job("test.work", move |payload, _| {
            sink.lock().push(payload);
            let mut release = release_rx.clone();
            async move {
                let _ = release.wait_for(|go| *go).await;
                Ok(Value::Null)
            }
        })
        .unwrap();
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({"n": 1}), Headers::new());
    eventually(|| redelivered.lock().len() == 1).await;
    broker.simulate_connection_loss();
    release_tx.send_replace(true);

    eventually(|| redelivered.lock().len() == 2).await;
    eventually(|| broker.unacked() == 0).await;
    assert_eq!(broker.ready("test.work"), 0);
}

#[tokio::test]
async fn reconnect_retries_until_the_broker_accepts() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    broker.fail_next_connects(3);
    broker.simulate_connection_loss();
    eventually(|| runtime.connection_status() == ConnectionStatus::Reconnecting).await;
    eventually(|| broker.consumer_count("test.work") == 1).await;

    let connects = broker
        .calls()
        .iter()
        .filter(|c| matches!(c, BrokerCall::Connect { .. }))
        .count();
    assert_eq!(connects, 5);
    assert_eq!(runtime.connection_generation(), 2);
}

#[tokio::test]
async fn publishing_waits_for_the_reconnect() {
    let broker = FakeBroker::new();
    broker.declare("test.work");
    let runtime = runtime(&broker);
    recording_job(&runtime, "other.work", Value::Null);
    runtime.start().await.unwrap();

    broker.fail_next_connects(2);
    broker.simulate_connection_loss();
    eventually(|| runtime.connection_status() == ConnectionStatus::Reconnecting).await;

    runtime
        .enqueue("test.work", json!({"during": "outage"}), Headers::new())
        .await
        .unwrap();

    assert_eq!(runtime.connection_generation(), 2);
    assert_eq!(broker.published_to("test.work"), vec![json!({"during": "outage"})]);
}

#[tokio::test]
async fn auto_recovery_off_reconnects_without_resubscribing() {
    let broker = FakeBroker::new();
    let config = RuntimeConfig {
        auto_recovery: false,
        reconnect_delay: Duration::from_millis(5),
        ..RuntimeConfig::default()
    };
    let runtime = Runtime::with_ids(broker.clone(), config, SequentialIdGen::new()).unwrap();
    let log = record_log(&runtime);
    recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    broker.simulate_connection_loss();
    eventually(|| {
        log.lock()
            .iter()
            .any(|line| line.starts_with("recovered: "))
    })
    .await;

    assert_eq!(consume_calls(&broker).len(), 1);
    assert_eq!(broker.consumer_count("test.work"), 0);
}

#[tokio::test]
async fn fatal_broker_error_is_escalated() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    broker.simulate_fatal("ACCESS_REFUSED - login refused");
    let err = runtime.fatal().await;

    assert!(matches!(err, RuntimeError::Fatal(ref reason) if reason.contains("ACCESS_REFUSED")));
    eventually(|| runtime.connection_status() == ConnectionStatus::Closed).await;
    let connects = broker
        .calls()
        .iter()
        .filter(|c| matches!(c, BrokerCall::Connect { .. }))
        .count();
    assert_eq!(connects, 1);
}

#[tokio::test]
async fn channel_errors_are_not_escalated() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    broker.simulate_channel_error("PRECONDITION_FAILED");
    let fatal = tokio::time::timeout(Duration::from_millis(50), runtime.fatal()).await;

    assert!(fatal.is_err());
    assert_eq!(runtime.connection_status(), ConnectionStatus::Open);
    assert_eq!(broker.consumer_count("test.work"), 1);
}

#[tokio::test]
async fn check_during_an_outage_waits_for_the_new_connection() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let log = record_log(&runtime);
    let gate = Toggle::new(false);
    runtime
        .register_job(
            "gated.work",
            JobOptions::new().when(gate.clone()),
            |_, _| async { Ok(Value::Null) },
        )
        .unwrap();
    runtime.start().await.unwrap();

    broker.fail_next_connects(1);
    broker.simulate_connection_loss();
    gate.set(true);
    runtime.check_all().await.unwrap();

    eventually(|| {
        log.lock()
            .contains(&"recovered: connection generation 2".to_string())
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        consume_calls(&broker),
        vec![("gated.work".to_string(), "gated.work.1".to_string())]
    );
    assert_eq!(broker.consumer_count("gated.work"), 1);
    assert_eq!(runtime.connection_generation(), 2);
}

#[tokio::test]
async fn publish_racing_the_loss_event_is_not_refused() {
    let broker = FakeBroker::new();
    broker.declare("test.work");
    let runtime = runtime(&broker);
    recording_job(&runtime, "other.work", Value::Null);
    runtime.start().await.unwrap();

    broker.fail_next_connects(1);
    broker.simulate_connection_loss();
    runtime
        .enqueue("test.work", json!({"n": 1}), Headers::new())
        .await
        .unwrap();

    assert_eq!(runtime.connection_generation(), 2);
    assert_eq!(broker.published_to("test.work"), vec![json!({"n": 1})]);
}
