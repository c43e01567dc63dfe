// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tests against the in-memory broker

mod conditional;
mod consume;
mod enqueue;
mod errors;
mod lifecycle;
mod recovery;
mod workflow;

use super::*;
use crate::test_helpers::{eventually, record_log, runtime, TestRuntime};
use jl_adapters::{BrokerCall, FakeBroker};
use serde_json::{json, Value};

fn headers(pairs: &[(&str, Value)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `(queue, tag)` of every consume call, in order
fn consume_calls(broker: &FakeBroker) -> Vec<(String, String)> {
    broker
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BrokerCall::Consume { queue, tag } => Some((queue, tag)),
            _ => None,
        })
        .collect()
}

/// Register a job that records every payload it is given and returns
/// `result`
fn recording_job(runtime: &TestRuntime, queue: &str, result: Value) -> Arc<Mutex<Vec<Payload>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    runtime
        .job(queue, move |payload, _| {
            sink.lock().push(payload);
            let result = result.clone();
            async move { Ok(result) }
        })
        .unwrap();
    seen
}
