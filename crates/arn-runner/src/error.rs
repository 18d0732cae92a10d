// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy (spec.md §7).

use thiserror::Error;

use arn_core::group::GroupNumber;
use arn_core::measurements::MeasurementsError;
use arn_core::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// spec.md §7 `BusyError`: a facade operation was attempted while
    /// another run is in progress.
    #[error("an analysis is already in progress")]
    Busy,

    /// Raised by `pause`/`resume`/`cancel`/`check` when no run is in
    /// progress at all. Not part of spec.md's named taxonomy, but
    /// distinguishing "nothing to operate on" from a silent no-op makes
    /// the facade's contract explicit to callers.
    #[error("no analysis is in progress")]
    NotRunning,

    /// spec.md §4.2 step 5, §7 `PrepareGroupFailed`: the pipeline refused
    /// group preparation. The controller converts this into a self-cancel
    /// rather than propagating it past the task boundary.
    #[error("pipeline refused to prepare group {key:?}")]
    PrepareGroupFailed { key: String },

    /// spec.md §4.2 step 5: the requested `[start, end)` window splits a
    /// group across its boundary.
    #[error("image-set window does not cover all of group {group} (a group may not be split across jobs)")]
    GroupWindowSplit { group: GroupNumber },

    #[error(transparent)]
    Measurements(#[from] MeasurementsError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// spec.md §7 `ProtocolError`: the boundary failed to bind or frame a
    /// message; fatal to the job server.
    #[error(transparent)]
    Boundary(#[from] arn_boundary::wire::WireError),
}
