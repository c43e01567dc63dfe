// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration from the environment

use std::time::Duration;

use jl_core::ConfigError;
use jl_engine::RuntimeConfig;

use crate::env;

/// Build a [`RuntimeConfig`] from the process environment.
pub trait RuntimeConfigExt: Sized {
    /// Unset variables keep their defaults; malformed ones are errors.
    fn from_env() -> Result<Self, ConfigError>;
}

impl RuntimeConfigExt for RuntimeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = RuntimeConfig::default();
        Ok(RuntimeConfig {
            amqp_url: env::amqp_url(),
            prefetch: match env::prefetch() {
                Some(raw) => parse_prefetch(&raw)?,
                None => defaults.prefetch,
            },
            auto_recovery: match env::auto_recovery() {
                Some(raw) => parse_flag(env::AUTO_RECOVERY, &raw)?,
                None => defaults.auto_recovery,
            },
            reconnect_delay: match env::reconnect_ms() {
                Some(raw) => parse_millis(env::RECONNECT_MS, &raw)?,
                None => defaults.reconnect_delay,
            },
        })
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

pub(crate) fn parse_prefetch(raw: &str) -> Result<u16, ConfigError> {
    match raw.parse::<u16>() {
        Ok(0) => Err(invalid(env::PREFETCH, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(env::PREFETCH, format!("'{raw}': {e}"))),
    }
}

pub(crate) fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(name, format!("'{raw}': {e}")))
}

pub(crate) fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, format!("'{raw}' is not a boolean"))),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
