// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-exports of test doubles used across crates (feature `test-support`).

pub use crate::event::test_support::{NullReply, RecordingSink};
pub use crate::pipeline::fake::FakePipeline;
