// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! arn-supervisor: spawns and tears down the worker process pool
//! (spec.md §4.5).
//!
//! Process-wide singleton (spec.md §3: "the Worker Supervisor is
//! process-wide, shared across Analyses"). Construct one at startup and
//! share it (by `Arc`) with every `Analysis`.

mod config;
mod handle;

pub use config::{default_worker_count, WorkerSupervisorConfig};
pub use handle::WorkerHandle;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use arn_core::id::WorkerIndex;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: WorkerIndex,
        #[source]
        source: std::io::Error,
    },
}

/// Default bound on how long a worker is given to exit after its deadman
/// stream is closed before the supervisor force-kills it (spec.md §9 open
/// question: "Recommend a bounded join with forced termination on timeout").
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns every spawned worker process. Shared across `Analysis` instances;
/// the worker pool itself is not per-run.
pub struct WorkerSupervisor {
    config: WorkerSupervisorConfig,
    handles: Mutex<Vec<WorkerHandle>>,
}

impl WorkerSupervisor {
    pub fn new(config: WorkerSupervisorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the configured number of worker processes, each given the
    /// announce endpoint and the image-provider endpoint as arguments, a
    /// piped stdin (the deadman), and captured stdout/stderr (spec.md §4.5).
    pub async fn start(
        &self,
        announce_endpoint: &str,
        image_provider_endpoint: &str,
    ) -> Result<(), SupervisorError> {
        let count = self.config.worker_count;
        info!(count, "starting worker pool");
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let index = WorkerIndex(i);
            let mut command = Command::new(&self.config.worker_binary);
            command
                .arg("--announce")
                .arg(announce_endpoint)
                .arg("--image-provider")
                .arg(image_provider_endpoint)
                .args(&self.config.extra_args)
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(false);

            let handle = WorkerHandle::spawn(index, command)
                .map_err(|source| SupervisorError::Spawn { index, source })?;
            handles.push(handle);
        }
        *self.handles.lock() = handles;
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// True iff at least one worker process is still running. Used by the
    /// controller's termination check to distinguish "no work left" from
    /// "all workers dead" (spec.md §9 open question).
    pub fn any_worker_alive(&self) -> bool {
        self.handles.lock().iter_mut().any(|h| !h.has_exited())
    }

    /// Close every deadman stream, then bound-wait for each child to exit,
    /// force-killing any that ignore EOF (spec.md §4.5, §9).
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for mut handle in handles {
            handle.close_deadman();
            let index = handle.index();
            match tokio::time::timeout(self.config.shutdown_grace, handle.wait()).await {
                Ok(Ok(status)) => info!(%index, ?status, "worker exited"),
                Ok(Err(e)) => warn!(%index, error = %e, "error waiting for worker"),
                Err(_) => {
                    warn!(%index, "worker ignored deadman EOF, forcing termination");
                    if let Err(e) = handle.kill().await {
                        error!(%index, error = %e, "failed to force-kill worker");
                    }
                }
            }
        }
    }
}
