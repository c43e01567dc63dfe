// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jobline enqueue`

use anyhow::{Context, Result};
use clap::Args;
use jl_core::{Headers, Route};
use jl_engine::{Runtime, RuntimeConfig};
use serde_json::Value;

#[derive(Args)]
pub struct EnqueueArgs {
    /// Target queue; several queues form a workflow run in order
    #[arg(required = true, value_name = "QUEUE")]
    pub queues: Vec<String>,

    /// Job data as JSON
    #[arg(long, default_value = "{}", value_name = "JSON")]
    pub data: String,

    /// Header to attach; VALUE is read as JSON, falling back to a string
    #[arg(long = "header", value_name = "KEY=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, Value)>,
}

pub async fn handle(args: EnqueueArgs, config: RuntimeConfig) -> Result<()> {
    let data = parse_data(&args.data)?;
    let headers: Headers = args.headers.into_iter().collect();
    let route = Route::workflow(args.queues);
    let target = route.hops().join(" -> ");

    let runtime = Runtime::new(super::broker(), config)?;
    let outcome = runtime.enqueue(route, data, headers).await;
    runtime.stop().await;
    outcome?;

    println!("enqueued {target}");
    Ok(())
}

pub(crate) fn parse_data(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--data is not valid JSON: {raw}"))
}

pub(crate) fn parse_header(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("header name missing in '{raw}'"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
