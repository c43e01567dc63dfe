// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker crate.

use std::path::PathBuf;

pub const AMQP_URL: &str = "AMQP_URL";
pub const PREFETCH: &str = "JOBLINE_PREFETCH";
pub const RECONNECT_MS: &str = "JOBLINE_RECONNECT_MS";
pub const AUTO_RECOVERY: &str = "JOBLINE_AUTO_RECOVERY";
pub const LOG: &str = "JOBLINE_LOG";
pub const LOG_FILE: &str = "JOBLINE_LOG_FILE";

/// Value of `name`, treating an empty or whitespace-only value as unset
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Broker URL
pub fn amqp_url() -> Option<String> {
    var(AMQP_URL)
}

/// Raw prefetch setting
pub fn prefetch() -> Option<String> {
    var(PREFETCH)
}

/// Raw reconnect delay in milliseconds
pub fn reconnect_ms() -> Option<String> {
    var(RECONNECT_MS)
}

/// Raw auto-recovery flag
pub fn auto_recovery() -> Option<String> {
    var(AUTO_RECOVERY)
}

/// Log filter directive: JOBLINE_LOG > RUST_LOG
pub fn log_directive() -> Option<String> {
    var(LOG).or_else(|| var("RUST_LOG"))
}

/// File to write logs to instead of stderr
pub fn log_file() -> Option<PathBuf> {
    var(LOG_FILE).map(PathBuf::from)
}

/// Serialises tests that mutate the process environment
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
