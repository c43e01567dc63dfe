// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jl_adapters::{BrokerCall, BrokerError, FakeBroker};
use jl_core::{Headers, SequentialIdGen};
use jl_engine::{RuntimeConfig, RuntimeError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn worker(broker: &FakeBroker) -> Arc<Worker<FakeBroker>> {
    let runtime =
        Runtime::with_ids(broker.clone(), RuntimeConfig::default(), SequentialIdGen::new())
            .unwrap();
    Arc::new(Worker::new(runtime))
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn run_consumes_until_stopped() {
    let broker = FakeBroker::new();
    let worker = worker(&broker);
    worker
        .runtime()
        .job("test.work", |_, _| async { Ok(Value::Null) })
        .unwrap();

    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });
    wait_until(|| broker.consumer_count("test.work") == 1).await;

    worker.stop().await;
    task.await.unwrap().unwrap();

    let calls = broker.calls();
    assert_eq!(
        calls[calls.len() - 2..],
        [BrokerCall::CloseChannel, BrokerCall::CloseConnection]
    );
    assert!(worker.runtime().is_stopped());
}

#[tokio::test]
async fn run_returns_the_fatal_error_after_stopping() {
    let broker = FakeBroker::new();
    let worker = worker(&broker);
    worker
        .runtime()
        .job("test.work", |_, _| async { Err(anyhow_error()) })
        .unwrap();

    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });
    wait_until(|| broker.consumer_count("test.work") == 1).await;
    broker.deliver("test.work", json!({}), Headers::new());

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "job on test.work failed: boom");
    assert!(matches!(
        err,
        WorkerError::Runtime(RuntimeError::Job { .. })
    ));
    assert!(!broker.is_connected());
}

#[tokio::test]
async fn run_fails_when_the_broker_is_unreachable() {
    let broker = FakeBroker::new();
    broker.fail_next_connects(1);
    let worker = worker(&broker);

    let err = worker.run().await.unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Runtime(RuntimeError::Broker(BrokerError::Connect(_)))
    ));
}

#[tokio::test]
async fn run_ends_on_a_fatal_broker_error() {
    let broker = FakeBroker::new();
    let worker = worker(&broker);
    worker
        .runtime()
        .job("test.work", |_, _| async { Ok(Value::Null) })
        .unwrap();

    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });
    wait_until(|| broker.consumer_count("test.work") == 1).await;
    broker.simulate_fatal("NOT_ALLOWED - vhost not found");

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, WorkerError::Runtime(RuntimeError::Fatal(_))));
}

#[test]
fn should_run_needs_a_registered_job() {
    let worker = worker(&FakeBroker::new());
    assert!(!worker.should_run(file!()));
}

#[test]
fn should_run_matches_the_registering_file() {
    let worker = worker(&FakeBroker::new());
    worker
        .runtime()
        .job("test.work", |_, _| async { Ok(Value::Null) })
        .unwrap();

    assert!(worker.should_run(file!()));
    assert!(worker.should_run(format!("./{}", file!())));
    assert!(!worker.should_run("src/bin/other.rs"));
}

#[yare::parameterized(
    identical        = { "src/main.rs", "src/main.rs", true },
    dot_prefixed     = { "./src/main.rs", "src/main.rs", true },
    absolute_suffix  = { "/work/app/src/main.rs", "src/main.rs", true },
    different_file   = { "src/main.rs", "src/lib.rs", false },
    different_dir    = { "/work/app/src/main.rs", "bin/main.rs", false },
)]
fn source_paths_are_compared_after_normalizing(a: &str, b: &str, expected: bool) {
    assert_eq!(same_file(Path::new(a), Path::new(b)), expected);
}

#[tokio::test]
async fn autorun_skips_when_another_file_registered_the_jobs() {
    let broker = FakeBroker::new();
    let worker = worker(&broker);
    worker
        .runtime()
        .job("test.work", |_, _| async { Ok(Value::Null) })
        .unwrap();

    let ran = worker.autorun("src/bin/other.rs").await.unwrap();

    assert!(!ran);
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn autorun_runs_from_the_registering_file() {
    let broker = FakeBroker::new();
    let worker = worker(&broker);
    worker
        .runtime()
        .job("test.work", |_, _| async { Ok(Value::Null) })
        .unwrap();

    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.autorun(file!()).await }
    });
    wait_until(|| broker.consumer_count("test.work") == 1).await;
    worker.stop().await;

    assert!(task.await.unwrap().unwrap());
}

fn anyhow_error() -> anyhow::Error {
    anyhow::anyhow!("boom")
}
