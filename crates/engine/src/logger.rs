// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replaceable sink for job lifecycle messages.
//!
//! Enqueue confirmations, deliveries and failures are reported as one-line
//! messages through the current [`Logger`]. By default they become
//! `tracing` events on the `jobline` target; applications can swap in their
//! own sink with `Runtime::set_logger`. Internal diagnostics never go
//! through this hook.

use std::fmt;
use std::sync::Arc;

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Sink>,
}

impl Logger {
    pub fn new(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn log(&self, msg: &str) {
        match &self.sink {
            Some(sink) => sink(msg),
            None => tracing::info!(target: "jobline", "{msg}"),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.sink.is_some() { "custom" } else { "tracing" };
        f.debug_tuple("Logger").field(&kind).finish()
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
