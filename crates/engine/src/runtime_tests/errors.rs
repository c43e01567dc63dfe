// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn failing_job(runtime: &TestRuntime, queue: &str) -> Arc<AtomicUsize> {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    runtime
        .job(queue, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("boom")) }
        })
        .unwrap();
    attempts
}

#[tokio::test]
async fn default_policy_logs_and_escalates_leaving_the_delivery_unacked() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let log = record_log(&runtime);
    failing_job(&runtime, "test.work");
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({"test": "test"}), Headers::new());
    let err = runtime.fatal().await;

    assert_eq!(err.to_string(), "job on test.work failed: boom");
    assert!(log.lock().contains(&"test.work failed: boom".to_string()));
    assert_eq!(broker.unacked(), 1);
    assert!(!broker
        .calls()
        .iter()
        .any(|c| matches!(c, BrokerCall::Ack { .. } | BrokerCall::Nack { .. })));
}

#[tokio::test]
async fn requeue_policy_nacks_and_the_job_is_redelivered() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    runtime
        .job("test.work", move |_, _| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(anyhow::anyhow!("flaky"))
                } else {
                    Ok(Value::Null)
                }
            }
        })
        .unwrap();
    let redelivered = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&redelivered);
    runtime.set_error_policy(move |_, info, _, _| {
        seen.lock().push(info.redelivered);
        Ok(Disposition::Requeue)
    });
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({}), Headers::new());
    eventually(|| attempts.load(Ordering::SeqCst) == 2 && broker.unacked() == 0).await;

    let settled: Vec<BrokerCall> = broker
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BrokerCall::Ack { .. } | BrokerCall::Nack { .. }))
        .collect();
    assert!(matches!(
        settled[..],
        [
            BrokerCall::Nack { requeue: true, .. },
            BrokerCall::Ack { .. }
        ]
    ));
    assert_eq!(*redelivered.lock(), vec![false]);
}

#[tokio::test]
async fn ack_policy_drops_the_failed_job() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let attempts = failing_job(&runtime, "test.work");
    runtime.set_error_policy(|_, _, _, _| Ok(Disposition::Ack));
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({}), Headers::new());
    eventually(|| broker.calls().iter().any(|c| matches!(c, BrokerCall::Ack { .. }))).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(broker.unacked(), 0);
    assert_eq!(broker.ready("test.work"), 0);
}

#[tokio::test]
async fn policy_sees_the_handler_payload_and_headers() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    failing_job(&runtime, "test.work");
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    runtime.set_error_policy(move |err, info, payload, headers| {
        *sink.lock() = Some((
            err.to_string(),
            info.queue.to_string(),
            info.consumer_tag.clone(),
            payload.clone(),
            headers.clone(),
        ));
        Ok(Disposition::Ack)
    });
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({"id": 7}), headers(&[("foo", json!("bar"))]));
    eventually(|| observed.lock().is_some()).await;

    let (err, queue, tag, payload, seen_headers) = observed.lock().take().unwrap();
    assert_eq!(err, "boom");
    assert_eq!(queue, "test.work");
    assert_eq!(tag.unwrap(), "test.work.1");
    assert_eq!(payload, Payload::Json(json!({"id": 7})));
    assert_eq!(seen_headers, headers(&[("foo", json!("bar"))]));
}

#[tokio::test]
async fn run_handler_reraises_with_the_default_policy() {
    let runtime = runtime(&FakeBroker::new());
    let log = record_log(&runtime);
    failing_job(&runtime, "test.work");

    let result = runtime.run_handler("test.work", json!({}), Headers::new()).await;

    assert!(matches!(result, Err(JobError::Callback(ref e)) if e.to_string() == "boom"));
    assert_eq!(*log.lock(), vec!["test.work failed: boom".to_string()]);
}

#[tokio::test]
async fn run_handler_returns_none_when_the_policy_absorbs_the_failure() {
    let runtime = runtime(&FakeBroker::new());
    failing_job(&runtime, "test.work");
    runtime.set_error_policy(|_, _, _, _| Ok(Disposition::Ack));

    let result = runtime.run_handler("test.work", json!({}), Headers::new()).await;

    assert_eq!(result.unwrap(), None);
}

#[tokio::test]
async fn panicking_callback_is_escalated_leaving_the_delivery_unacked() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let explode = true;
    runtime
        .job("test.work", move |_, _| async move {
            if explode {
                panic!("callback bug");
            }
            Ok(Value::Null)
        })
        .unwrap();
    runtime.start().await.unwrap();

    broker.deliver("test.work", json!({}), Headers::new());
    let err = tokio::time::timeout(std::time::Duration::from_secs(1), runtime.fatal())
        .await
        .expect("a dead consumer should end the worker");

    assert_eq!(err.to_string(), "consumer on test.work died: callback bug");
    assert_eq!(broker.unacked(), 1);
}
