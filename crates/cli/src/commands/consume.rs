// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jobline consume`

use anyhow::Result;
use clap::Args;
use jl_core::Payload;
use jl_engine::{Runtime, RuntimeConfig};
use jl_worker::Worker;
use serde_json::Value;

#[derive(Args)]
pub struct ConsumeArgs {
    /// Queue to consume from
    #[arg(default_value = "jobs")]
    pub queue: String,
}

pub async fn handle(args: ConsumeArgs, config: RuntimeConfig) -> Result<()> {
    let runtime = Runtime::new(super::broker(), config)?;
    runtime.job(args.queue, |payload, _| async move {
        println!("{}", consumed_line(&payload));
        Ok(Value::Null)
    })?;

    Worker::new(runtime).run().await?;
    Ok(())
}

pub(crate) fn consumed_line(payload: &Payload) -> String {
    format!("consumed {payload}")
}

#[cfg(test)]
#[path = "consume_tests.rs"]
mod tests;
