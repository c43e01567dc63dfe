// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global tracing subscriber for worker processes

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{env, WorkerError};

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter from JOBLINE_LOG or RUST_LOG, `info` when unset or unparsable
pub fn env_filter() -> EnvFilter {
    env::log_directive()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Logs go to stderr, or to JOBLINE_LOG_FILE through a non-blocking writer
/// when it is set. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> Result<Option<WorkerGuard>, WorkerError> {
    let filter = env_filter();
    let Some(path) = env::log_file() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| WorkerError::Logging(e.to_string()))?;
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| WorkerError::Logging(format!("{} is not a file", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| WorkerError::Logging(e.to_string()))?;
    Ok(Some(guard))
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
