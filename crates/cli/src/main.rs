// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobline - publish and consume jobs from the command line

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{consume, enqueue};
use jl_engine::RuntimeConfig;
use jl_worker::RuntimeConfigExt;

#[derive(Parser)]
#[command(name = "jobline", version, about = "Jobline - job queues on an AMQP broker")]
struct Cli {
    /// Broker URL, overriding AMQP_URL
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume jobs from a queue and print each one
    Consume(consume::ConsumeArgs),
    /// Publish a job and wait for the broker to confirm it
    Enqueue(enqueue::EnqueueArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", format_error(&e));
        std::process::exit(1);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level message already contains every cause, the chain is
/// skipped; otherwise it is rendered like anyhow's Debug output.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

/// Environment settings with the command line applied on top
fn runtime_config(url: Option<String>) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_env()?;
    if url.is_some() {
        config.amqp_url = url;
    }
    Ok(config)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = jl_worker::logging::init()?;
    let config = runtime_config(cli.url)?;

    match cli.command {
        Commands::Consume(args) => consume::handle(args, config).await,
        Commands::Enqueue(args) => enqueue::handle(args, config).await,
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
