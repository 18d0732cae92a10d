// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Runner`: the machinery for one Analysis (spec.md §3).
//!
//! Owns the pause/cancel flags and the producer halves of the three
//! internal queues. The consumer halves (`RunnerReceivers`) are handed
//! once, at construction, to the controller and job-server tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use arn_core::id::AnalysisId;
use arn_core::image_set::ImageSetNumber;
use arn_core::job::Job;
use arn_core::pipeline::Pipeline;

use crate::queues::{ReturnedReport, RunnerReceivers};
use crate::wake::WakeConditions;

pub struct Runner {
    /// Cleared by the controller at the end of its run (spec.md §4.2 step
    /// 10), which is how the job server knows to exit its own loop
    /// (spec.md §4.3: "while `runner.analysis_id == my_analysis_id`").
    analysis_id: RwLock<Option<AnalysisId>>,
    /// The Runner's own clone of the pipeline, immutable after start
    /// (spec.md §5).
    pipeline: Box<dyn Pipeline>,
    paused: AtomicBool,
    cancelled: AtomicBool,
    wake: WakeConditions,
    work_tx: crate::queues::WorkSender,
    in_process_tx: crate::queues::InProcessSender,
    returned_tx: crate::queues::ReturnedSender,
}

impl Runner {
    /// Construct a fresh Runner for `analysis_id`, returning it alongside
    /// the queue-consumer halves the caller must hand to the controller
    /// and job-server tasks.
    pub fn new(pipeline: Box<dyn Pipeline>, analysis_id: AnalysisId) -> (Arc<Self>, RunnerReceivers) {
        let (work_tx, work_rx) = tokio::sync::mpsc::unbounded_channel();
        let (in_process_tx, in_process_rx) = tokio::sync::mpsc::unbounded_channel();
        let (returned_tx, returned_rx) = tokio::sync::mpsc::unbounded_channel();

        let runner = Arc::new(Self {
            analysis_id: RwLock::new(Some(analysis_id)),
            pipeline,
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            wake: WakeConditions::default(),
            work_tx,
            in_process_tx,
            returned_tx,
        });

        (
            runner,
            RunnerReceivers {
                work_rx,
                in_process_rx,
                returned_rx,
            },
        )
    }

    pub fn analysis_id(&self) -> Option<AnalysisId> {
        *self.analysis_id.read()
    }

    /// spec.md §4.2 step 10: "Clear the run id so the job server exits
    /// its own loop."
    pub fn clear_analysis_id(&self) {
        *self.analysis_id.write() = None;
        self.wake.notify_all();
    }

    pub fn pipeline(&self) -> &dyn Pipeline {
        self.pipeline.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// spec.md §4.1: "set the corresponding flag on the Runner and wake
    /// both tasks from any wait."
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn wake(&self) -> &WakeConditions {
        &self.wake
    }

    /// Producer side of `work_queue` (spec.md §4.2 step 6).
    pub fn enqueue_job(&self, job: Job) {
        // The job server may already have exited (run finishing or
        // cancelled); dropping the job on a closed channel is harmless.
        let _ = self.work_tx.send(job);
        self.wake.work_available.notify_one();
    }

    /// Producer side of `in_process_queue` (spec.md §4.3 WorkRequest
    /// handling: "push that job onto `in_process_queue`").
    pub fn notify_dispatched(&self, image_sets: Vec<ImageSetNumber>) {
        let _ = self.in_process_tx.send(image_sets);
        self.wake.dispatch_posted.notify_one();
    }

    /// Producer side of `returned_measurements_queue` (spec.md §4.3
    /// MeasurementsReport handling).
    pub fn notify_returned(&self, report: ReturnedReport) {
        let _ = self.returned_tx.send(report);
        self.wake.measurements_returned.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arn_core::test_support::FakePipeline;

    #[tokio::test]
    async fn clear_analysis_id_is_observed_by_a_fresh_read() {
        let id = AnalysisId::new();
        let (runner, _recv) = Runner::new(Box::new(FakePipeline::new(false)), id);
        assert_eq!(runner.analysis_id(), Some(id));
        runner.clear_analysis_id();
        assert_eq!(runner.analysis_id(), None);
    }

    #[tokio::test]
    async fn set_paused_wakes_a_flags_changed_waiter() {
        let id = AnalysisId::new();
        let (runner, _recv) = Runner::new(Box::new(FakePipeline::new(false)), id);
        let notified = runner.wake().flags_changed.notified();
        runner.set_paused(true);
        notified.await;
        assert!(runner.is_paused());
    }
}
