// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Analysis Facade (spec.md §4.1): the front end's handle onto one
//! execution of a pipeline over a measurements store.
//!
//! An `Analysis` is one execution (spec.md §3): `start` may succeed at
//! most once per instance. A cancelled or finished run cannot be
//! restarted — construct a fresh `Analysis` for the next run.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

use arn_announcer::AnnounceBus;
use arn_core::event::EventSink;
use arn_core::id::AnalysisId;
use arn_core::measurements::MeasurementsStore;
use arn_core::pipeline::Pipeline;
use arn_supervisor::WorkerSupervisor;

use crate::controller::{self, ControllerOptions};
use crate::error::RunnerError;
use crate::job_server;
use crate::runner::Runner;

struct RunHandle {
    runner: Arc<Runner>,
    controller_task: JoinHandle<()>,
    job_server_task: JoinHandle<()>,
}

struct Inner {
    /// Taken by `start`; its absence alone does not distinguish "never
    /// started" from "started" since a run leaves this `None` too — the
    /// `run` field is the source of truth for "in progress".
    initial_store: Option<Box<dyn MeasurementsStore>>,
    /// `None` before the first `start`, after `cancel`, and once both
    /// tasks report they finished via `check`.
    run: Option<RunHandle>,
    /// Set once `start` has been called, even after the run ends —
    /// this `Analysis` is single-use (spec.md §3: "Analysis — one execution").
    started: bool,
}

/// Per-run handle exposing start/pause/resume/cancel/check to the front
/// end (spec.md §4.1). All operations are serialized by an internal
/// mutex; mutation of the in-progress state happens only while that
/// mutex is held.
pub struct Analysis {
    pipeline: Box<dyn Pipeline>,
    workspace_dir: PathBuf,
    announce_bus: Arc<dyn AnnounceBus>,
    supervisor: Arc<WorkerSupervisor>,
    inner: Mutex<Inner>,
}

impl Analysis {
    pub fn new(
        pipeline: Box<dyn Pipeline>,
        initial_store: Box<dyn MeasurementsStore>,
        workspace_dir: PathBuf,
        announce_bus: Arc<dyn AnnounceBus>,
        supervisor: Arc<WorkerSupervisor>,
    ) -> Self {
        Self {
            pipeline,
            workspace_dir,
            announce_bus,
            supervisor,
            inner: Mutex::new(Inner {
                initial_store: Some(initial_store),
                run: None,
                started: false,
            }),
        }
    }

    /// spec.md §4.1 `start`: allocate a run id, prepare the pipeline over
    /// the initial store, launch the controller and job-server tasks.
    pub fn start(&self, options: ControllerOptions, sink: EventSink) -> Result<AnalysisId, RunnerError> {
        let mut inner = self.inner.lock();
        if inner.started {
            return Err(RunnerError::Busy);
        }
        let Some(mut initial_store) = inner.initial_store.take() else {
            // Unreachable: `started` above already guards the only other
            // taker of `initial_store`, but report rather than panic.
            return Err(RunnerError::Busy);
        };
        inner.started = true;

        let analysis_id = AnalysisId::new();
        let pipeline = self.pipeline.clone_pipeline();

        // spec.md §4.1: "calls the pipeline's prepare_run once
        // synchronously ... flushes that store (so the backing file is
        // durable before any worker reads it)".
        pipeline.prepare_run(initial_store.as_mut())?;
        initial_store.flush()?;
        let initial_store_path = initial_store.path().to_path_buf();

        let (runner, receivers) = Runner::new(pipeline, analysis_id);
        let pipeline_blob = runner.pipeline().serialize_to_text();
        let working_store_path = self.workspace_dir.join(format!("{analysis_id}.working.store"));

        let controller_task = tokio::spawn(controller::run(
            Arc::clone(&runner),
            receivers.in_process_rx,
            receivers.returned_rx,
            initial_store,
            working_store_path,
            options,
            Arc::clone(&self.supervisor),
            sink.clone(),
        ));

        let job_server_task = tokio::spawn({
            let runner = Arc::clone(&runner);
            let announce_bus = Arc::clone(&self.announce_bus);
            let sink = sink.clone();
            async move {
                if let Err(e) = job_server::run(
                    runner,
                    receivers.work_rx,
                    analysis_id,
                    announce_bus,
                    pipeline_blob,
                    initial_store_path,
                    sink,
                )
                .await
                {
                    error!(%analysis_id, error = %e, "job server task failed");
                }
            }
        });

        inner.run = Some(RunHandle {
            runner,
            controller_task,
            job_server_task,
        });

        Ok(analysis_id)
    }

    /// spec.md §4.1 `pause`: "set the corresponding flag on the Runner
    /// and wake both tasks from any wait."
    pub fn pause(&self) -> Result<(), RunnerError> {
        let inner = self.inner.lock();
        let run = inner.run.as_ref().ok_or(RunnerError::NotRunning)?;
        run.runner.set_paused(true);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), RunnerError> {
        let inner = self.inner.lock();
        let run = inner.run.as_ref().ok_or(RunnerError::NotRunning)?;
        run.runner.set_paused(false);
        Ok(())
    }

    /// spec.md §4.1 `cancel`: sets the cancel flag and wakes both tasks,
    /// then clears the in-progress handle — "a cancelled run cannot be
    /// resumed; a new Analysis must be constructed".
    pub fn cancel(&self) -> Result<(), RunnerError> {
        let mut inner = self.inner.lock();
        let run = inner.run.take().ok_or(RunnerError::NotRunning)?;
        run.runner.cancel();
        Ok(())
    }

    /// spec.md §4.1 `check`: "returns true iff both Runner tasks are
    /// still alive."
    pub fn check(&self) -> bool {
        let inner = self.inner.lock();
        match &inner.run {
            Some(run) => !run.controller_task.is_finished() && !run.job_server_task.is_finished(),
            None => false,
        }
    }
}
