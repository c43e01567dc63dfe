// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker driver: runs a runtime until told to stop

use std::path::{Component, Path, PathBuf};

use jl_adapters::BrokerAdapter;
use jl_engine::Runtime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

use crate::WorkerError;

pub struct Worker<B: BrokerAdapter> {
    runtime: Runtime<B>,
    released: Notify,
}

impl<B: BrokerAdapter> Worker<B> {
    pub fn new(runtime: Runtime<B>) -> Self {
        Self {
            runtime,
            released: Notify::new(),
        }
    }

    pub fn runtime(&self) -> &Runtime<B> {
        &self.runtime
    }

    /// Start every handler and consume until SIGINT, SIGTERM, [`Worker::stop`]
    /// or a fatal error. Always stops the runtime before returning.
    pub async fn run(&self) -> Result<(), WorkerError> {
        info!("Starting jobline worker");
        let mut sigterm = signal(SignalKind::terminate()).map_err(WorkerError::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(WorkerError::Signal)?;

        let outcome = match self.runtime.start().await {
            Ok(()) => {
                info!(
                    handlers = self.runtime.registry().handlers().len(),
                    "worker ready"
                );
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                        Ok(())
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, shutting down...");
                        Ok(())
                    }
                    _ = self.released.notified() => {
                        info!("Stop requested");
                        Ok(())
                    }
                    err = self.runtime.fatal() => Err(err.into()),
                }
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &outcome {
            error!(error = %e, "worker failed");
        }
        self.stop().await;
        info!("Worker stopped");
        outcome
    }

    /// Close the channel, then the connection, then release `run`. Idempotent.
    pub async fn stop(&self) {
        self.runtime.stop().await;
        self.released.notify_one();
    }

    /// Whether this process should run the worker: at least one job is
    /// registered and `entry_file` is the file the first one was
    /// registered from.
    pub fn should_run(&self, entry_file: impl AsRef<Path>) -> bool {
        match self.runtime.registry().app_file() {
            Some(app_file) => same_file(Path::new(app_file), entry_file.as_ref()),
            None => false,
        }
    }

    /// [`Worker::run`] if [`Worker::should_run`]. Returns whether it ran.
    pub async fn autorun(&self, entry_file: impl AsRef<Path>) -> Result<bool, WorkerError> {
        if !self.should_run(entry_file) {
            return Ok(false);
        }
        self.run().await?;
        Ok(true)
    }
}

/// Compare two source paths, tolerating `./` segments and a relative path
/// given against an absolute one.
fn same_file(a: &Path, b: &Path) -> bool {
    if let (Ok(a), Ok(b)) = (a.canonicalize(), b.canonicalize()) {
        return a == b;
    }
    let (a, b) = (normalize(a), normalize(b));
    match (a.is_absolute(), b.is_absolute()) {
        (true, false) => a.ends_with(&b),
        (false, true) => b.ends_with(&a),
        _ => a == b,
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
