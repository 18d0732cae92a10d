// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::SHUTDOWN_GRACE;

/// Configuration for the worker pool (spec.md §4.5: "determine the
/// desired count ... spawn N worker processes").
#[derive(Debug, Clone)]
pub struct WorkerSupervisorConfig {
    /// Path (or bare name, resolved via `PATH`) to the worker executable.
    pub worker_binary: PathBuf,
    /// Desired worker count. spec.md: "OS-reported logical CPU count,
    /// default 4 if undetermined" — callers typically pass
    /// `std::thread::available_parallelism()` here.
    pub worker_count: usize,
    /// Extra arguments appended after `--announce`/`--image-provider`.
    pub extra_args: Vec<String>,
    /// How long to wait for a worker to exit after closing its deadman
    /// stream before force-killing it.
    pub shutdown_grace: Duration,
}

impl WorkerSupervisorConfig {
    pub fn new(worker_binary: impl Into<PathBuf>, worker_count: usize) -> Self {
        Self {
            worker_binary: worker_binary.into(),
            worker_count,
            extra_args: Vec::new(),
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

/// `spec.md` §4.5: "OS-reported logical CPU count, default 4 if undetermined".
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
