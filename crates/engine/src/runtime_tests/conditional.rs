// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::JobOptions;
use jl_core::{ActivationState, Toggle};

#[tokio::test]
async fn start_skips_conditional_handlers_whose_predicate_is_false() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    runtime
        .register_job(
            "test.work",
            JobOptions::new().when(Toggle::new(false)),
            |_, _| async { Ok(Value::Null) },
        )
        .unwrap();

    runtime.start().await.unwrap();

    assert!(consume_calls(&broker).is_empty());
    assert_eq!(broker.queue_options("test.work"), None);
}

#[tokio::test]
async fn a_job_can_switch_another_handler_on() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let gate = Toggle::new(false);
    let gated = {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        runtime
            .register_job(
                "gated.work",
                JobOptions::new().when(gate.clone()),
                move |payload, _| {
                    sink.lock().push(payload);
                    async { Ok(Value::Null) }
                },
            )
            .unwrap();
        seen
    };
    let opener = gate.clone();
    runtime
        .job("open.gate", move |_, _| {
            opener.set(true);
            async { Ok(Value::Null) }
        })
        .unwrap();
    broker.deliver("gated.work", json!({"waiting": true}), Headers::new());
    runtime.start().await.unwrap();
    assert!(gated.lock().is_empty());

    broker.deliver("open.gate", json!({}), Headers::new());

    eventually(|| gated.lock().len() == 1).await;
    assert_eq!(
        consume_calls(&broker),
        vec![
            ("open.gate".to_string(), "open.gate.1".to_string()),
            ("gated.work".to_string(), "gated.work.2".to_string()),
        ]
    );
}

#[tokio::test]
async fn a_job_that_closes_its_own_gate_unsubscribes() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let gate = Toggle::new(true);
    let closer = gate.clone();
    runtime
        .register_job(
            "test.work",
            JobOptions::new().when(gate.clone()),
            move |_, _| {
                closer.set(false);
                async { Ok(Value::Null) }
            },
        )
        .unwrap();
    runtime.start().await.unwrap();
    assert_eq!(broker.consumer_count("test.work"), 1);

    broker.deliver("test.work", json!({}), Headers::new());

    let handler = runtime.registry().find("test.work").unwrap();
    eventually(|| handler.state() == ActivationState::Off).await;
    assert_eq!(broker.consumer_count("test.work"), 0);
    assert!(broker.calls().contains(&BrokerCall::Cancel {
        tag: "test.work.1".into()
    }));

    // Later jobs wait for the next subscription
    broker.deliver("test.work", json!({}), Headers::new());
    assert_eq!(broker.ready("test.work"), 1);
}

#[tokio::test]
async fn disabling_a_handler_unsubscribes_it_on_the_next_check() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();

    runtime.registry().find("test.work").unwrap().disable();
    runtime.check_all().await.unwrap();

    assert_eq!(broker.consumer_count("test.work"), 0);
    assert!(broker.calls().contains(&BrokerCall::Cancel {
        tag: "test.work.1".into()
    }));
}

#[tokio::test]
async fn steady_only_registries_skip_the_post_job_check() {
    let broker = FakeBroker::new();
    let runtime = runtime(&broker);
    let seen = recording_job(&runtime, "test.work", Value::Null);
    runtime.start().await.unwrap();
    runtime.registry().find("test.work").unwrap().disable();

    broker.deliver("test.work", json!({}), Headers::new());
    eventually(|| seen.lock().len() == 1).await;
    eventually(|| broker.unacked() == 0).await;

    // Nothing re-evaluated the disabled handler
    assert_eq!(broker.consumer_count("test.work"), 1);
}
