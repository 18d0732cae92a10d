// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job server task (spec.md §4.3).
//!
//! Multiplexes the boundary's request inbox, dispatching each request by
//! kind. Requests are a tagged `enum RequestBody` matched exhaustively,
//! so there is no "unknown request" runtime hole (spec.md §9): a
//! malformed wire frame fails at deserialization, inside the boundary,
//! before it ever reaches this task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use arn_announcer::AnnounceBus;
use arn_boundary::protocol::{RequestBody, ResponseBody, WireJobType, MEASUREMENTS_ACK};
use arn_boundary::{Boundary, PendingRequest, ReplySender};
use arn_core::event::{AnalysisEvent, EventSink, ReplyHandle};
use arn_core::id::AnalysisId;
use arn_core::image_set::ImageSetNumber;
use arn_core::job::JobType;
use arn_core::measurements::FlatFileMeasurementsStore;

use crate::error::RunnerError;
use crate::queues::{ReturnedReport, WorkReceiver};
use crate::runner::Runner;

/// Adapts a detached boundary reply into the core's `ReplyHandle`
/// (spec.md §6: interaction/display/exception replies carry an opaque
/// payload the front end owns).
struct BoundaryReply(ReplySender);

impl ReplyHandle for BoundaryReply {
    fn reply(self: Box<Self>, payload: Vec<u8>) {
        self.0.send(ResponseBody::Opaque { payload });
    }
}

/// Run the job server loop until the Runner's analysis id no longer
/// matches `analysis_id` (spec.md §4.3: cleared by the controller at the
/// end of its run).
pub async fn run(
    runner: Arc<Runner>,
    mut work_rx: WorkReceiver,
    analysis_id: AnalysisId,
    announce_bus: Arc<dyn AnnounceBus>,
    pipeline_blob: String,
    initial_measurements_path: PathBuf,
    sink: EventSink,
) -> Result<(), RunnerError> {
    let (inbox_tx, mut inbox_rx) = mpsc::channel::<PendingRequest>(64);
    let boundary = Boundary::bind(inbox_tx).await?;
    let endpoint = boundary.request_endpoint();

    let mut already_paused = false;

    loop {
        if runner.analysis_id() != Some(analysis_id) {
            break;
        }

        announce_bus.publish(endpoint.clone(), analysis_id);

        if runner.is_cancelled() {
            sink(AnalysisEvent::AnalysisCancelled { analysis_id });
            break;
        }

        if runner.is_paused() {
            if !already_paused {
                sink(AnalysisEvent::AnalysisPaused { analysis_id });
                already_paused = true;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = runner.wake().flags_changed.notified() => {}
            }
            continue;
        }

        let request = tokio::select! {
            biased;
            req = inbox_rx.recv() => req,
            _ = tokio::time::sleep(Duration::from_secs(1)) => None,
        };

        let Some(pending) = request else {
            continue;
        };

        if already_paused {
            sink(AnalysisEvent::AnalysisResumed { analysis_id });
            already_paused = false;
        }

        dispatch(
            pending,
            &runner,
            &mut work_rx,
            &pipeline_blob,
            &initial_measurements_path,
            &sink,
            analysis_id,
        );
    }

    announce_bus.publish_done(analysis_id);
    boundary.stop().await;
    info!(%analysis_id, "job server stopped");
    Ok(())
}

fn dispatch(
    pending: PendingRequest,
    runner: &Arc<Runner>,
    work_rx: &mut WorkReceiver,
    pipeline_blob: &str,
    initial_measurements_path: &std::path::Path,
    sink: &EventSink,
    analysis_id: AnalysisId,
) {
    let (envelope, reply) = pending.into_parts();
    debug!(%analysis_id, kind = envelope.body.kind(), "dispatching request");
    match envelope.body {
        RequestBody::Pipeline => {
            reply.send(ResponseBody::Pipeline {
                pipeline_blob: pipeline_blob.to_string(),
            });
        }
        RequestBody::InitialMeasurements => {
            reply.send(ResponseBody::InitialMeasurements {
                path: initial_measurements_path.to_string_lossy().into_owned(),
            });
        }
        RequestBody::Work => match work_rx.try_recv() {
            Ok(job) => {
                let jobtype = match job.job_type() {
                    JobType::Group => WireJobType::Group,
                    JobType::Image => WireJobType::Image,
                };
                let images = job.images_csv();
                let dispatched = job.image_sets().to_vec();
                reply.send(ResponseBody::Work {
                    jobtype,
                    images: Some(images),
                });
                runner.notify_dispatched(dispatched);
            }
            Err(_) => {
                reply.send(ResponseBody::Work {
                    jobtype: WireJobType::None,
                    images: None,
                });
            }
        },
        RequestBody::Measurements { path, image_set_numbers } => {
            reply.send(ResponseBody::MeasurementsAck {
                message: MEASUREMENTS_ACK.to_string(),
            });

            let image_sets = parse_image_set_numbers(&image_set_numbers);
            // spec.md §7 `MeasurementsLoadError`: on load failure, log and
            // continue — the job is abandoned, not re-queued (spec.md §9
            // open question, resolved in favor of the source's bare
            // re-raise reading as "give up, don't retry").
            match FlatFileMeasurementsStore::load(&path) {
                Ok(store) => {
                    runner.notify_returned(ReturnedReport {
                        store: Box::new(store),
                        image_sets,
                    });
                }
                Err(e) => {
                    warn!(%analysis_id, %path, error = %e, "failed to load reported measurements; abandoning job");
                }
            }
        }
        RequestBody::Interaction { payload } => {
            let reply: Box<dyn ReplyHandle> = Box::new(BoundaryReply(reply));
            sink(AnalysisEvent::Interaction {
                analysis_id,
                payload,
                reply,
            });
        }
        RequestBody::Display { payload } => {
            let reply: Box<dyn ReplyHandle> = Box::new(BoundaryReply(reply));
            sink(AnalysisEvent::Display {
                analysis_id,
                payload,
                reply,
            });
        }
        RequestBody::Exception { payload } => {
            let reply: Box<dyn ReplyHandle> = Box::new(BoundaryReply(reply));
            sink(AnalysisEvent::Exception {
                analysis_id,
                payload,
                reply,
            });
        }
    }
}

fn parse_image_set_numbers(csv: &str) -> Vec<ImageSetNumber> {
    csv.split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .map(ImageSetNumber)
        .collect()
}
