// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn sandwich_workflow_forwards_the_merged_result() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "make.sandwich", json!({"sandwich": "ham"}));
    let eaten = recording_job(&runtime, "eat.sandwich", Value::Null);
    runtime.start().await.unwrap();

    runtime
        .enqueue(
            ["make.sandwich", "eat.sandwich"],
            json!({"for": "me"}),
            Headers::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        broker.published_to("make.sandwich"),
        vec![json!({"for": "me", "next_job": "eat.sandwich"})]
    );
    eventually(|| eaten.lock().len() == 1).await;
    assert_eq!(
        broker.published_to("eat.sandwich"),
        vec![json!({"for": "me", "sandwich": "ham"})]
    );
    assert_eq!(
        eaten.lock()[0],
        Payload::Json(json!({"for": "me", "sandwich": "ham"}))
    );
}

#[tokio::test]
async fn forwarded_jobs_keep_the_delivery_headers() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "first", Value::Null);
    broker.declare("second");
    runtime.start().await.unwrap();

    broker.deliver(
        "first",
        json!({"next_job": "second"}),
        headers(&[("trace", json!("abc"))]),
    );
    eventually(|| !broker.published_to("second").is_empty()).await;

    let (_, message) = broker
        .published()
        .into_iter()
        .find(|(q, _)| q == "second")
        .unwrap();
    assert_eq!(message.headers, headers(&[("trace", json!("abc"))]));
    assert_eq!(broker.published_to("second"), vec![json!({})]);
}

#[yare::parameterized(
    object_result = { json!({"b": 2}), json!({"a": 1, "b": 2, "next_job": "c"}) },
    null_result   = { Value::Null,     json!({"a": 1, "next_job": "c"}) },
    scalar_result = { json!(42),       json!({"a": 1, "result": 42, "next_job": "c"}) },
)]
fn three_step_workflow_hands_on_the_tail(result: Value, forwarded: Value) {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async {
            let broker = FakeBroker::new();
            let runtime = runtime(&broker);
            recording_job(&runtime, "a", result);
            broker.declare("b");
            runtime.start().await.unwrap();

            runtime
                .enqueue(["a", "b", "c"], json!({"a": 1}), Headers::new())
                .await
                .unwrap();

            eventually(|| !broker.published_to("b").is_empty()).await;
            assert_eq!(broker.published_to("b"), vec![forwarded]);
        });
}

#[tokio::test]
async fn failed_forward_goes_through_the_error_policy() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let log = record_log(&runtime);
    recording_job(&runtime, "first", Value::Null);
    runtime.start().await.unwrap();

    broker.deliver("first", json!({"next_job": "undeclared"}), Headers::new());

    let err = runtime.fatal().await;
    assert!(matches!(
        err,
        RuntimeError::Job {
            ref queue,
            source: JobError::Forward(_)
        } if queue == "first"
    ));
    assert!(log
        .lock()
        .iter()
        .any(|line| line.starts_with("first failed: ")));
    assert_eq!(broker.unacked(), 1);
}
