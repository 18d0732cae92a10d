//! End-to-end behavioral specifications for the analysis runner (spec.md §8).
//!
//! Each scenario drives a real `Analysis` through its public facade,
//! standing in for a worker subprocess by speaking the boundary's wire
//! protocol directly over loopback.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/single_image_set.rs"]
mod single_image_set;
#[path = "specs/pause_resume.rs"]
mod pause_resume;
#[path = "specs/grouped_run.rs"]
mod grouped_run;
#[path = "specs/cancel_during_dispatch.rs"]
mod cancel_during_dispatch;
#[path = "specs/unknown_image_set_report.rs"]
mod unknown_image_set_report;
#[path = "specs/prepare_group_failure.rs"]
mod prepare_group_failure;
