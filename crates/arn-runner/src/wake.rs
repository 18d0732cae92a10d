// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named wake conditions for the controller's condition variable
//! (spec.md §5, §9: "name the wake conditions explicitly ... so tests
//! can assert each").
//!
//! Each condition is a `tokio::sync::Notify` used with `notify_one`: a
//! notification fired before the controller starts waiting is not lost,
//! since `Notify` stores a single permit for the next `notified().await`
//! to consume.

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WakeConditions {
    /// A job was pushed onto the work queue.
    pub work_available: Notify,
    /// A job was dispatched to a worker (pushed onto `in_process_queue`).
    pub dispatch_posted: Notify,
    /// A job's measurements were reported back (pushed onto
    /// `returned_measurements_queue`).
    pub measurements_returned: Notify,
    /// `paused`/`cancelled` changed.
    pub flags_changed: Notify,
}

impl WakeConditions {
    /// Fire every condition. Mirrors the source's `notify_threads()`:
    /// writers always follow a write by waking both tasks, establishing
    /// the happens-before edge the condition-variable wait needs
    /// (spec.md §5).
    pub fn notify_all(&self) {
        self.work_available.notify_one();
        self.dispatch_posted.notify_one();
        self.measurements_returned.notify_one();
        self.flags_changed.notify_one();
    }
}
