// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin control-plane listener standing in for the GUI/CLI front end
//! (spec.md §1: out of scope, "only its network endpoint is consumed").
//!
//! Reuses `arn_boundary::wire`'s length-delimited JSON framing for its
//! own request/reply pair instead of inventing a second wire format.
//! One request per connection, mirroring the worker boundary's own
//! per-connection request/reply shape.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use arn_announcer::AnnounceBus;
use arn_boundary::wire::{self, WireError};
use arn_core::event::EventSink;
use arn_core::id::AnalysisId;
use arn_core::measurements::FlatFileMeasurementsStore;
use arn_runner::{Analysis, ControllerOptions, RunnerError};
use arn_supervisor::WorkerSupervisor;

use crate::pipeline::NullPipeline;

#[derive(Debug, Serialize, Deserialize)]
pub enum ControlRequest {
    Start {
        initial_store_path: String,
        pipeline_blob: String,
        image_set_start: Option<u32>,
        image_set_end: Option<u32>,
        overwrite: bool,
    },
    Pause { analysis_id: AnalysisId },
    Resume { analysis_id: AnalysisId },
    Cancel { analysis_id: AnalysisId },
    Check { analysis_id: AnalysisId },
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ControlResponse {
    Started { analysis_id: AnalysisId },
    Ack,
    CheckResult { alive: bool },
    Error { message: String },
}

/// Holds every `Analysis` the daemon has started, keyed by its id, so a
/// later Pause/Resume/Cancel/Check request can find the right one.
pub struct ControlService {
    workspace_dir: PathBuf,
    announce_bus: Arc<dyn AnnounceBus>,
    supervisor: Arc<WorkerSupervisor>,
    sink: EventSink,
    analyses: Mutex<HashMap<AnalysisId, Arc<Analysis>>>,
}

impl ControlService {
    pub fn new(
        workspace_dir: PathBuf,
        announce_bus: Arc<dyn AnnounceBus>,
        supervisor: Arc<WorkerSupervisor>,
        sink: EventSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            workspace_dir,
            announce_bus,
            supervisor,
            sink,
            analyses: Mutex::new(HashMap::new()),
        })
    }

    pub async fn serve(self: Arc<Self>, bind: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(bind).await?;
        info!(%bind, "control plane listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = this.handle_connection(stream).await {
                    warn!(%peer, error = %e, "control connection failed");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<(), WireError> {
        let bytes = wire::read_message(&mut stream).await?;
        let request: ControlRequest = wire::decode(&bytes)?;
        let response = self.dispatch(request);
        let encoded = wire::encode(&response)?;
        wire::write_message(&mut stream, &encoded).await
    }

    fn dispatch(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Start {
                initial_store_path,
                pipeline_blob,
                image_set_start,
                image_set_end,
                overwrite,
            } => self.start(
                initial_store_path,
                pipeline_blob,
                image_set_start,
                image_set_end,
                overwrite,
            ),
            ControlRequest::Pause { analysis_id } => {
                self.with_analysis(analysis_id, Analysis::pause)
            }
            ControlRequest::Resume { analysis_id } => {
                self.with_analysis(analysis_id, Analysis::resume)
            }
            ControlRequest::Cancel { analysis_id } => {
                self.with_analysis(analysis_id, Analysis::cancel)
            }
            ControlRequest::Check { analysis_id } => {
                let analyses = self.analyses.lock();
                match analyses.get(&analysis_id) {
                    Some(analysis) => ControlResponse::CheckResult {
                        alive: analysis.check(),
                    },
                    None => unknown_analysis(analysis_id),
                }
            }
        }
    }

    fn start(
        &self,
        initial_store_path: String,
        pipeline_blob: String,
        image_set_start: Option<u32>,
        image_set_end: Option<u32>,
        overwrite: bool,
    ) -> ControlResponse {
        let store = match FlatFileMeasurementsStore::load(&initial_store_path) {
            Ok(store) => store,
            Err(e) => {
                return ControlResponse::Error {
                    message: format!("failed to load {initial_store_path}: {e}"),
                }
            }
        };

        let analysis = Analysis::new(
            Box::new(NullPipeline::new(pipeline_blob)),
            Box::new(store),
            self.workspace_dir.clone(),
            Arc::clone(&self.announce_bus),
            Arc::clone(&self.supervisor),
        );

        let options = ControllerOptions {
            image_set_start,
            image_set_end,
            overwrite,
        };

        match analysis.start(options, Arc::clone(&self.sink)) {
            Ok(analysis_id) => {
                self.analyses
                    .lock()
                    .insert(analysis_id, Arc::new(analysis));
                ControlResponse::Started { analysis_id }
            }
            Err(e) => ControlResponse::Error {
                message: e.to_string(),
            },
        }
    }

    fn with_analysis(
        &self,
        analysis_id: AnalysisId,
        op: impl FnOnce(&Analysis) -> Result<(), RunnerError>,
    ) -> ControlResponse {
        let analyses = self.analyses.lock();
        match analyses.get(&analysis_id) {
            Some(analysis) => match op(analysis) {
                Ok(()) => ControlResponse::Ack,
                Err(e) => ControlResponse::Error {
                    message: e.to_string(),
                },
            },
            None => unknown_analysis(analysis_id),
        }
    }
}

fn unknown_analysis(analysis_id: AnalysisId) -> ControlResponse {
    ControlResponse::Error {
        message: format!("unknown analysis {analysis_id}"),
    }
}
