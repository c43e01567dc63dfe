// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jobline worker driver
//!
//! Runs a [`jl_engine::Runtime`] as a long-lived process: installs logging
//! and signal handlers, starts every registered handler and keeps consuming
//! until a signal, an explicit stop or a fatal error.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
pub mod env;
mod error;
pub mod logging;
mod worker;

pub use config::RuntimeConfigExt;
pub use error::WorkerError;
pub use worker::Worker;
