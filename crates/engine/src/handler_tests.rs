// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{handler, toggled_handler, Action, RecordingActions};
use jl_core::Toggle;
use serde_json::json;

#[tokio::test]
async fn always_true_predicate_subscribes_exactly_once() {
    let actions = RecordingActions::new();
    let handler = handler("test.work");

    assert_eq!(handler.check(&actions).await.unwrap(), Transition::Subscribed);
    for _ in 0..3 {
        assert_eq!(handler.check(&actions).await.unwrap(), Transition::Unchanged);
    }

    assert_eq!(actions.calls(), vec![Action::Subscribe("test.work".into())]);
    assert_eq!(handler.state(), ActivationState::On);
    assert_eq!(handler.consumer_tag(), Some(ConsumerTag::new("test.work.1")));
}

#[tokio::test]
async fn toggling_predicate_subscribes_and_unsubscribes_once_each() {
    let actions = RecordingActions::new();
    let toggle = Toggle::new(true);
    let handler = toggled_handler("test.work", &toggle);

    handler.check(&actions).await.unwrap();
    handler.check(&actions).await.unwrap();
    toggle.set(false);
    handler.check(&actions).await.unwrap();
    handler.check(&actions).await.unwrap();
    toggle.set(true);
    handler.check(&actions).await.unwrap();
    handler.check(&actions).await.unwrap();

    assert_eq!(
        actions.calls(),
        vec![
            Action::Subscribe("test.work".into()),
            Action::Unsubscribe("test.work.1".into()),
            Action::Subscribe("test.work".into()),
        ]
    );
    assert_eq!(handler.consumer_tag(), Some(ConsumerTag::new("test.work.2")));
}

#[tokio::test]
async fn false_predicate_never_subscribes() {
    let actions = RecordingActions::new();
    let handler = toggled_handler("test.work", &Toggle::new(false));

    assert_eq!(handler.check(&actions).await.unwrap(), Transition::Unchanged);
    assert!(actions.calls().is_empty());
    assert_eq!(handler.state(), ActivationState::Off);
}

#[tokio::test]
async fn disable_unsubscribes_on_next_check() {
    let actions = RecordingActions::new();
    let handler = handler("test.work");
    handler.check(&actions).await.unwrap();

    handler.disable();

    assert!(!handler.should_subscribe());
    assert_eq!(
        handler.check(&actions).await.unwrap(),
        Transition::Unsubscribed
    );
    assert_eq!(handler.check(&actions).await.unwrap(), Transition::Unchanged);
    assert_eq!(handler.consumer_tag(), None);
}

#[tokio::test]
async fn failed_subscribe_leaves_handler_off() {
    let actions = RecordingActions::new();
    actions.fail_next();
    let handler = handler("test.work");

    assert!(handler.check(&actions).await.is_err());
    assert_eq!(handler.state(), ActivationState::Off);

    assert_eq!(handler.check(&actions).await.unwrap(), Transition::Subscribed);
}

#[tokio::test]
async fn failed_unsubscribe_leaves_handler_on() {
    let actions = RecordingActions::new();
    let toggle = Toggle::new(true);
    let handler = toggled_handler("test.work", &toggle);
    handler.check(&actions).await.unwrap();

    toggle.set(false);
    actions.fail_next();

    assert!(handler.check(&actions).await.is_err());
    assert_eq!(handler.state(), ActivationState::On);
}

#[tokio::test]
async fn start_ignores_predicate_and_is_idempotent() {
    let actions = RecordingActions::new();
    let handler = toggled_handler("test.work", &Toggle::new(false));

    assert_eq!(handler.start(&actions).await.unwrap(), Transition::Subscribed);
    assert_eq!(handler.start(&actions).await.unwrap(), Transition::Unchanged);
    assert_eq!(actions.calls().len(), 1);
}

#[tokio::test]
async fn start_skips_disabled_handler() {
    let actions = RecordingActions::new();
    let handler = handler("test.work");
    handler.disable();

    assert_eq!(handler.start(&actions).await.unwrap(), Transition::Unchanged);
    assert!(actions.calls().is_empty());
}

#[tokio::test]
async fn reset_forgets_subscription() {
    let actions = RecordingActions::new();
    let handler = handler("test.work");
    handler.check(&actions).await.unwrap();

    handler.reset();

    assert_eq!(handler.state(), ActivationState::Off);
    assert_eq!(handler.check(&actions).await.unwrap(), Transition::Subscribed);
}

#[yare::parameterized(
    steady      = { None, HandlerKind::Steady },
    conditional = { Some(Toggle::new(true)), HandlerKind::Conditional },
)]
fn kind_follows_predicate(toggle: Option<Toggle>, expected: HandlerKind) {
    let handler = match toggle {
        Some(t) => toggled_handler("test.work", &t),
        None => handler("test.work"),
    };
    assert_eq!(handler.kind(), expected);
}

#[tokio::test]
async fn invoke_passes_payload_and_headers() {
    let handler = Arc::new(Handler::new(
        QueueName::new("test.work").unwrap(),
        QueueOptions::default(),
        None,
        Location::caller(),
        |payload: Payload, headers: Headers| async move {
            Ok(json!({"payload": payload.as_json().cloned(), "headers": headers}))
        },
    ));
    let mut headers = Headers::new();
    headers.insert("foo".into(), json!("bar"));

    let result = handler
        .invoke(Payload::Json(json!({"test": "test"})), headers)
        .await
        .unwrap();

    assert_eq!(
        result,
        json!({"payload": {"test": "test"}, "headers": {"foo": "bar"}})
    );
}

#[test]
fn display_shows_queue_and_state() {
    let handler = handler("test.work");
    assert_eq!(handler.to_string(), "<handler queue=test.work on=false>");
}
