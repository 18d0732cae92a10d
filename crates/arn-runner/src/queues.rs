// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three internal queues (spec.md §3).
//!
//! Each is a plain `tokio::sync::mpsc::unbounded_channel`: every sender
//! is cheaply cloneable for the producer side (the controller enqueues
//! jobs; the job server enqueues dispatch notices and measurement
//! reports) and each receiver is moved, once, to the single task that
//! consumes it — so no additional locking is needed around the channel
//! itself.

use tokio::sync::mpsc;

use arn_core::image_set::ImageSetNumber;
use arn_core::job::Job;
use arn_core::measurements::MeasurementsStore;

pub type WorkSender = mpsc::UnboundedSender<Job>;
pub type WorkReceiver = mpsc::UnboundedReceiver<Job>;

pub type InProcessSender = mpsc::UnboundedSender<Vec<ImageSetNumber>>;
pub type InProcessReceiver = mpsc::UnboundedReceiver<Vec<ImageSetNumber>>;

/// A completed job report: the reporting worker's measurements store
/// plus the image sets it covers (spec.md §3:
/// "payload: measurement handle + image-set list").
pub struct ReturnedReport {
    pub store: Box<dyn MeasurementsStore>,
    pub image_sets: Vec<ImageSetNumber>,
}

pub type ReturnedSender = mpsc::UnboundedSender<ReturnedReport>;
pub type ReturnedReceiver = mpsc::UnboundedReceiver<ReturnedReport>;

/// The consuming halves of all three queues, handed once to the
/// controller (`in_process_rx`, `returned_rx`) and the job server
/// (`work_rx`) at construction time.
pub struct RunnerReceivers {
    pub work_rx: WorkReceiver,
    pub in_process_rx: InProcessReceiver,
    pub returned_rx: ReturnedReceiver,
}
