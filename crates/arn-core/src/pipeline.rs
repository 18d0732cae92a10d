// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline collaborator interface (spec.md §1: "out of scope, specified
//! only as an interface").
//!
//! A pipeline is an opaque unit the runner can serialize (to hand to
//! workers), copy (so each `Analysis` owns its own), and register a
//! lifecycle-event listener on. This crate ships the trait and a fake
//! implementation good enough to drive the workspace's own tests; a real
//! pipeline implementation is someone else's crate.

use std::sync::Arc;

use thiserror::Error;

use crate::image_set::ImageSetNumber;
use crate::measurements::MeasurementsStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline refused to prepare group {key:?}")]
    PrepareGroupRefused { key: String },
    #[error("pipeline hook failed: {0}")]
    HookFailed(String),
}

/// A pipeline-internal progress notice, forwarded verbatim to the front end
/// (spec.md §4.2 step 2: "forwards every pipeline event to the front end sink").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent(pub String);

pub type PipelineListener = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// The pipeline collaborator.
///
/// Implementations must be cheaply cloneable: `Analysis` clones a pipeline
/// once at construction, and the job server re-serializes the same copy
/// on every `PIPELINE` request without mutating it (spec.md §5: "The
/// pipeline copy held by the Runner is immutable after start").
pub trait Pipeline: Send + Sync {
    fn clone_pipeline(&self) -> Box<dyn Pipeline>;

    /// Serialize to the text blob handed to workers over the wire
    /// (spec.md §6: `pipeline_blob`).
    fn serialize_to_text(&self) -> String;

    /// Register a listener that receives every pipeline-internal event.
    fn set_listener(&self, listener: PipelineListener);

    /// Called once, synchronously, before any job is dispatched
    /// (spec.md §4.1).
    fn prepare_run(&self, store: &mut dyn MeasurementsStore) -> Result<(), PipelineError>;

    /// Called once per group key (or once with an empty key when the run
    /// is not grouped) before work is enqueued. Returning `Ok(false)`
    /// means the pipeline refused preparation (spec.md §4.2 step 5,
    /// §7 `PrepareGroupFailed`).
    fn prepare_group(
        &self,
        key: &str,
        image_sets: &[ImageSetNumber],
    ) -> Result<bool, PipelineError>;

    /// Called once per group key after all its image sets are Done
    /// (only when grouping was not needed, per spec.md §4.2 step 7).
    fn post_group(&self, key: &str);

    /// Called once at the very end of a successful run, over the merged
    /// working store (spec.md §4.2 step 7).
    fn post_run(&self, store: &mut dyn MeasurementsStore);

    /// Whether the pipeline declares grouping over the given store
    /// (spec.md §4.2 step 5).
    fn declares_grouping(&self, store: &dyn MeasurementsStore) -> bool;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// A pipeline that does nothing but record what was asked of it, for
    /// tests. `grouping` mirrors the `Image/Group_Number` column a real
    /// pipeline would read from the store.
    pub struct FakePipeline {
        pub grouping: bool,
        pub refuse_prepare_group: bool,
        listener: Mutex<Option<PipelineListener>>,
        pub prepare_run_calls: Mutex<u32>,
        pub prepare_group_calls: Mutex<Vec<String>>,
        pub post_group_calls: Mutex<Vec<String>>,
        pub post_run_calls: Mutex<u32>,
    }

    impl FakePipeline {
        pub fn new(grouping: bool) -> Self {
            Self {
                grouping,
                refuse_prepare_group: false,
                listener: Mutex::new(None),
                prepare_run_calls: Mutex::new(0),
                prepare_group_calls: Mutex::new(Vec::new()),
                post_group_calls: Mutex::new(Vec::new()),
                post_run_calls: Mutex::new(0),
            }
        }

        pub fn refusing_prepare_group(mut self) -> Self {
            self.refuse_prepare_group = true;
            self
        }

        /// Test helper: raise a pipeline event through whatever listener is
        /// currently registered, if any.
        pub fn emit(&self, event: PipelineEvent) {
            if let Some(listener) = self.listener.lock().clone() {
                listener(event);
            }
        }
    }

    impl Pipeline for FakePipeline {
        fn clone_pipeline(&self) -> Box<dyn Pipeline> {
            Box::new(Self {
                grouping: self.grouping,
                refuse_prepare_group: self.refuse_prepare_group,
                listener: Mutex::new(self.listener.lock().clone()),
                prepare_run_calls: Mutex::new(*self.prepare_run_calls.lock()),
                prepare_group_calls: Mutex::new(self.prepare_group_calls.lock().clone()),
                post_group_calls: Mutex::new(self.post_group_calls.lock().clone()),
                post_run_calls: Mutex::new(*self.post_run_calls.lock()),
            })
        }

        fn serialize_to_text(&self) -> String {
            format!("FakePipeline(grouping={})", self.grouping)
        }

        fn set_listener(&self, listener: PipelineListener) {
            *self.listener.lock() = Some(listener);
        }

        fn prepare_run(&self, _store: &mut dyn MeasurementsStore) -> Result<(), PipelineError> {
            *self.prepare_run_calls.lock() += 1;
            Ok(())
        }

        fn prepare_group(
            &self,
            key: &str,
            _image_sets: &[ImageSetNumber],
        ) -> Result<bool, PipelineError> {
            self.prepare_group_calls.lock().push(key.to_string());
            Ok(!self.refuse_prepare_group)
        }

        fn post_group(&self, key: &str) {
            self.post_group_calls.lock().push(key.to_string());
        }

        fn post_run(&self, _store: &mut dyn MeasurementsStore) {
            *self.post_run_calls.lock() += 1;
        }

        fn declares_grouping(&self, _store: &dyn MeasurementsStore) -> bool {
            self.grouping
        }
    }
}
