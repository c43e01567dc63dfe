// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::JobOptions;
use jl_core::QueueOptions;

#[tokio::test]
async fn start_declares_and_consumes_every_handler() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "test.work", Value::Null);
    runtime
        .register_job(
            "scratch",
            JobOptions::new().durable(false).auto_delete(true),
            |_, _| async { Ok(Value::Null) },
        )
        .unwrap();

    runtime.start().await.unwrap();

    assert_eq!(
        broker.queue_options("test.work"),
        Some(QueueOptions {
            durable: true,
            auto_delete: false
        })
    );
    assert_eq!(
        broker.queue_options("scratch"),
        Some(QueueOptions {
            durable: false,
            auto_delete: true
        })
    );
    assert_eq!(
        consume_calls(&broker),
        vec![
            ("test.work".to_string(), "test.work.1".to_string()),
            ("scratch".to_string(), "scratch.2".to_string()),
        ]
    );
    let handler = runtime.registry().find("test.work").unwrap();
    assert_eq!(handler.consumer_tag().unwrap(), "test.work.1");
}

#[tokio::test]
async fn delivery_runs_the_callback_and_is_acknowledged() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let log = record_log(&runtime);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    runtime
        .job("test.work", move |payload, headers| {
            sink.lock().push((payload, headers));
            async { Ok(Value::Null) }
        })
        .unwrap();
    runtime.start().await.unwrap();

    broker.deliver(
        "test.work",
        json!({"test": "test"}),
        headers(&[("foo", json!("bar"))]),
    );
    eventually(|| broker.calls().iter().any(|c| matches!(c, BrokerCall::Ack { .. }))).await;

    assert_eq!(
        *seen.lock(),
        vec![(
            Payload::Json(json!({"test": "test"})),
            headers(&[("foo", json!("bar"))])
        )]
    );
    assert_eq!(broker.unacked(), 0);
    assert_eq!(
        *log.lock(),
        vec![r#"received: test.work({"test":"test"})"#.to_string()]
    );
}

#[tokio::test]
async fn deliveries_are_processed_one_at_a_time_in_order() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let seen = recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    for n in 0..3 {
        broker.deliver("test.work", json!({ "n": n }), Headers::new());
    }
    // Prefetch 1: everything beyond the in-flight delivery waits in the queue
    assert!(broker.unacked() <= 1);
    eventually(|| seen.lock().len() == 3).await;

    let order: Vec<Value> = seen
        .lock()
        .iter()
        .filter_map(|p| p.get("n").cloned())
        .collect();
    assert_eq!(order, vec![json!(0), json!(1), json!(2)]);
    eventually(|| broker.unacked() == 0).await;
}

#[tokio::test]
async fn deliveries_before_start_wait_in_the_queue() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let seen = recording_job(&runtime, "test.work", Value::Null);
    broker.deliver("test.work", json!({"early": true}), Headers::new());
    assert_eq!(broker.ready("test.work"), 1);

    runtime.start().await.unwrap();

    eventually(|| seen.lock().len() == 1).await;
    eventually(|| broker.ready("test.work") == 0 && broker.unacked() == 0).await;
}

#[tokio::test]
async fn run_handler_calls_the_callback_without_the_broker() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    runtime
        .job("test.work", |payload, headers| async move {
            Ok(json!({"payload": payload.as_json().cloned(), "headers": headers}))
        })
        .unwrap();

    let result = runtime
        .run_handler(
            "test.work",
            json!({"test": "test"}),
            headers(&[("foo", json!("bar"))]),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        Some(json!({"payload": {"test": "test"}, "headers": {"foo": "bar"}}))
    );
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn run_handler_does_not_forward_chained_payloads() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "make.sandwich", json!({"sandwich": "ham"}));

    let result = runtime
        .run_handler(
            "make.sandwich",
            json!({"for": "me", "next_job": "eat.sandwich"}),
            Headers::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"sandwich": "ham"})));
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn run_handler_rejects_unknown_queues() {
    let runtime = runtime(&FakeBroker::new());

    let result = runtime.run_handler("missing", json!({}), Headers::new()).await;

    assert!(matches!(result, Err(JobError::UnknownHandler(ref q)) if q == "missing"));
}
