// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller task (spec.md §4.2).
//!
//! Groups image sets into jobs, tracks per-image-set status (stored
//! directly in the working measurements store under `("Image", "Status",
//! n)`, mirroring `original_source/cellprofiler/analysis.py`'s use of the
//! measurements object as its own status table), integrates returned
//! measurements, emits lifecycle events, and terminates the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};

use arn_core::event::{AnalysisEvent, EventSink};
use arn_core::group::{Group, GroupIndex, GroupNumber};
use arn_core::id::AnalysisId;
use arn_core::image_set::{ImageSetNumber, ImageSetStatus};
use arn_core::job::Job;
use arn_core::measurements::MeasurementsStore;
use arn_core::pipeline::PipelineEvent;
use arn_supervisor::WorkerSupervisor;

use crate::error::RunnerError;
use crate::queues::{InProcessReceiver, ReturnedReceiver};
use crate::runner::Runner;

/// `image_set_start`/`image_set_end`/`overwrite` (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub image_set_start: Option<u32>,
    pub image_set_end: Option<u32>,
    pub overwrite: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            image_set_start: None,
            image_set_end: None,
            overwrite: false,
        }
    }
}

/// Run the controller loop to completion. Always leaves the Runner's
/// analysis id cleared on return, which is how the job server knows to
/// exit (spec.md §4.2 step 10).
pub async fn run(
    runner: Arc<Runner>,
    in_process_rx: InProcessReceiver,
    returned_rx: ReturnedReceiver,
    initial_store: Box<dyn MeasurementsStore>,
    working_store_path: PathBuf,
    options: ControllerOptions,
    supervisor: Arc<WorkerSupervisor>,
    sink: EventSink,
) {
    let Some(analysis_id) = runner.analysis_id() else {
        return;
    };

    if let Err(e) = run_inner(
        Arc::clone(&runner),
        in_process_rx,
        returned_rx,
        initial_store,
        working_store_path,
        options,
        supervisor,
        sink.clone(),
        analysis_id,
    )
    .await
    {
        // spec.md §7: "errors inside the controller ... task are caught
        // at the task boundary, logged, and converted into an
        // AnalysisFinished{cancelled=true} so the front end is never
        // left waiting."
        error!(%analysis_id, error = %e, "controller task failed");
        runner.cancel();
        sink(AnalysisEvent::AnalysisFinished {
            analysis_id,
            cancelled: true,
        });
    }

    runner.clear_analysis_id();
}

#[allow(clippy::too_many_arguments)]
async fn run_inner(
    runner: Arc<Runner>,
    mut in_process_rx: InProcessReceiver,
    mut returned_rx: ReturnedReceiver,
    mut initial_store: Box<dyn MeasurementsStore>,
    working_store_path: PathBuf,
    options: ControllerOptions,
    supervisor: Arc<WorkerSupervisor>,
    sink: EventSink,
    analysis_id: AnalysisId,
) -> Result<(), RunnerError> {
    // Step 1: clone the initial store into a working store.
    let mut working_store = initial_store.copy_to(&working_store_path)?;

    // Step 2: forward every pipeline event to the front end.
    {
        let sink = sink.clone();
        runner.pipeline().set_listener(Arc::new(move |event: PipelineEvent| {
            sink(AnalysisEvent::Pipeline { analysis_id, event });
        }));
    }

    // Step 3.
    sink(AnalysisEvent::AnalysisStarted { analysis_id });

    let start = options.image_set_start.unwrap_or(1);
    let end = options
        .image_set_end
        .unwrap_or_else(|| start + initial_store.image_set_count() as u32);

    // Step 4: status reset pass.
    for n in start..end {
        let image_set = ImageSetNumber(n);
        let current = status_of(working_store.as_ref(), image_set);
        if options.overwrite || current != Some(ImageSetStatus::Done) {
            write_status(working_store.as_mut(), image_set, ImageSetStatus::Unprocessed);
        }
    }

    // Step 5: job construction.
    let declares_grouping = runner.pipeline().declares_grouping(working_store.as_ref());
    let mut jobs = match build_jobs(working_store.as_ref(), start, end, declares_grouping) {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(%analysis_id, error = %e, "job construction failed; cancelling run");
            runner.cancel();
            Vec::new()
        }
    };

    if !declares_grouping && !runner.is_cancelled() {
        for (idx, n) in (start..end).enumerate() {
            let image_set = ImageSetNumber(n);
            initial_store.write("Image", "Group_Number", image_set, "0".to_string());
            initial_store.write("Image", "Group_Index", image_set, idx.to_string());
        }
        initial_store.flush()?;

        let window: Vec<ImageSetNumber> = (start..end).map(ImageSetNumber).collect();
        match runner.pipeline().prepare_group("", &window) {
            Ok(true) => {}
            Ok(false) => {
                warn!(%analysis_id, "pipeline refused prepare_group; cancelling run");
                runner.cancel();
                jobs.clear();
            }
            Err(e) => {
                warn!(%analysis_id, error = %e, "prepare_group errored; cancelling run");
                runner.cancel();
                jobs.clear();
            }
        }
    }

    // Step 6: enqueue jobs in the order they were built (ascending
    // image-set order or ascending group number — spec.md §4.2
    // "Tie-break / ordering rules").
    for job in jobs {
        runner.enqueue_job(job);
    }

    // Step 7: main loop.
    loop {
        while let Ok(report) = returned_rx.try_recv() {
            working_store.merge_from(report.store.as_ref(), &report.image_sets);
            for image_set in &report.image_sets {
                advance_status(working_store.as_mut(), *image_set, ImageSetStatus::Done);
            }
        }
        while let Ok(dispatched) = in_process_rx.try_recv() {
            for image_set in dispatched {
                advance_status(working_store.as_mut(), image_set, ImageSetStatus::InProcess);
            }
        }

        let counts = tally(working_store.as_ref(), start, end);
        sink(AnalysisEvent::AnalysisProgress {
            analysis_id,
            counts: counts.clone(),
        });

        if runner.is_cancelled() {
            break;
        }

        let remaining = counts.get(&ImageSetStatus::InProcess).copied().unwrap_or(0)
            + counts.get(&ImageSetStatus::Unprocessed).copied().unwrap_or(0);
        if remaining == 0 {
            if !declares_grouping {
                runner.pipeline().post_group("");
            }
            runner.pipeline().post_run(working_store.as_mut());
            break;
        }

        // spec.md §9 open question: "no work left" and "all workers dead"
        // both look like an indefinite wait from here, so check worker
        // liveness explicitly rather than waiting forever on a Notify no
        // worker remains to fire. A supervisor with no configured workers
        // at all (e.g. a test harness driving the boundary directly) is
        // a different case and not treated as a stall.
        if supervisor.worker_count() > 0 && !supervisor.any_worker_alive() {
            error!(%analysis_id, "no workers remain with jobs outstanding; cancelling run");
            runner.cancel();
            continue;
        }

        if runner.is_paused() {
            runner.wake().flags_changed.notified().await;
            continue;
        }

        tokio::select! {
            _ = runner.wake().dispatch_posted.notified() => {}
            _ = runner.wake().measurements_returned.notified() => {}
            _ = runner.wake().flags_changed.notified() => {}
        }
    }

    // Step 8.
    working_store.flush()?;

    // Step 9.
    let cancelled = runner.is_cancelled();
    info!(%analysis_id, cancelled, "analysis finished");
    sink(AnalysisEvent::AnalysisFinished {
        analysis_id,
        cancelled,
    });

    Ok(())
}

fn status_of(store: &dyn MeasurementsStore, image_set: ImageSetNumber) -> Option<ImageSetStatus> {
    store
        .read("Image", "Status", image_set)
        .and_then(|s| ImageSetStatus::from_str(s).ok())
}

fn write_status(store: &mut dyn MeasurementsStore, image_set: ImageSetNumber, status: ImageSetStatus) {
    store.write("Image", "Status", image_set, status.to_string());
}

/// Advance status forward only (spec.md §4.2: "Done cannot be
/// overwritten by InProcess").
fn advance_status(store: &mut dyn MeasurementsStore, image_set: ImageSetNumber, next: ImageSetStatus) {
    let mut current = status_of(store, image_set).unwrap_or(ImageSetStatus::Unprocessed);
    if current.advance_to(next) {
        write_status(store, image_set, current);
    }
}

fn tally(store: &dyn MeasurementsStore, start: u32, end: u32) -> HashMap<ImageSetStatus, usize> {
    let mut counts = HashMap::new();
    counts.insert(ImageSetStatus::Unprocessed, 0);
    counts.insert(ImageSetStatus::InProcess, 0);
    counts.insert(ImageSetStatus::Done, 0);
    for n in start..end {
        let status = status_of(store, ImageSetNumber(n)).unwrap_or(ImageSetStatus::Unprocessed);
        *counts.entry(status).or_insert(0) += 1;
    }
    counts
}

fn group_number_of(store: &dyn MeasurementsStore, image_set: ImageSetNumber) -> GroupNumber {
    store
        .read("Image", "Group_Number", image_set)
        .and_then(|s| s.parse::<u32>().ok())
        .map(GroupNumber)
        .unwrap_or(GroupNumber(0))
}

fn group_index_of(store: &dyn MeasurementsStore, image_set: ImageSetNumber) -> GroupIndex {
    store
        .read("Image", "Group_Index", image_set)
        .and_then(|s| s.parse::<u32>().ok())
        .map(GroupIndex)
        .unwrap_or(GroupIndex(0))
}

/// Build the job list for `[start, end)` (spec.md §4.2 step 5).
///
/// When grouping is declared, buckets every image set the *store* knows
/// about (not just the window) by group number — iterating every key
/// rather than tracking only the last-seen group number, which fixes the
/// collapse bug flagged in spec.md §9 — so a window that splits a group
/// can be detected and rejected.
fn build_jobs(
    store: &dyn MeasurementsStore,
    start: u32,
    end: u32,
    declares_grouping: bool,
) -> Result<Vec<Job>, RunnerError> {
    if !declares_grouping {
        return Ok((start..end).map(|n| Job::new(vec![ImageSetNumber(n)], false)).collect());
    }

    let total = store.image_set_count().max(end as usize) as u32;
    let mut all_buckets: BTreeMap<GroupNumber, Vec<(GroupIndex, ImageSetNumber)>> = BTreeMap::new();
    for n in 1..=total {
        let image_set = ImageSetNumber(n);
        if !store.has_image_set(image_set) {
            continue;
        }
        let group_number = group_number_of(store, image_set);
        let group_index = group_index_of(store, image_set);
        all_buckets.entry(group_number).or_default().push((group_index, image_set));
    }

    let mut window_groups: BTreeSet<GroupNumber> = BTreeSet::new();
    for n in start..end {
        window_groups.insert(group_number_of(store, ImageSetNumber(n)));
    }

    let mut jobs = Vec::new();
    for group_number in window_groups {
        let Some(members) = all_buckets.get(&group_number) else {
            continue;
        };
        let in_window = members
            .iter()
            .filter(|(_, n)| n.get() >= start && n.get() < end)
            .count();
        if in_window != members.len() {
            return Err(RunnerError::GroupWindowSplit { group: group_number });
        }
        let group = Group::new(group_number, members.clone());
        jobs.push(Job::new(group.image_sets, true));
    }
    Ok(jobs)
}
