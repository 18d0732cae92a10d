// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::ExitStatus;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{info, warn};

use arn_core::id::WorkerIndex;

/// A spawned worker process: the child itself, its deadman stdin, and a
/// logger task forwarding stdout/stderr lines (spec.md §4.5: "A logger
/// task per worker reads output lines and forwards them to the
/// structured log annotated with the worker's index").
pub struct WorkerHandle {
    index: WorkerIndex,
    child: Child,
    deadman: Option<ChildStdin>,
}

impl WorkerHandle {
    pub fn spawn(index: WorkerIndex, mut command: Command) -> Result<Self, std::io::Error> {
        let mut child = command.spawn()?;
        let deadman = child.stdin.take();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(index, "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(index, "stderr", stderr));
        }

        Ok(Self {
            index,
            child,
            deadman,
        })
    }

    pub fn index(&self) -> WorkerIndex {
        self.index
    }

    /// Non-blocking liveness check (spec.md §9: distinguishes "no work
    /// left" from "all workers dead" in the controller's termination
    /// check).
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Close the worker's stdin, its deadman's switch. A worker that reads
    /// stdin to EOF is expected to exit on its own (spec.md §4.4).
    pub fn close_deadman(&mut self) {
        self.deadman.take();
    }

    pub async fn wait(&mut self) -> Result<ExitStatus, std::io::Error> {
        self.child.wait().await
    }

    pub async fn kill(&mut self) -> Result<(), std::io::Error> {
        self.child.kill().await
    }
}

async fn forward_lines<R>(index: WorkerIndex, stream_name: &'static str, reader: R)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(%index, stream = stream_name, "{line}"),
            Ok(None) => return,
            Err(e) => {
                warn!(%index, stream = stream_name, error = %e, "error reading worker output");
                return;
            }
        }
    }
}
