// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A concrete `Pipeline` implementation for the daemon binary.
//!
//! spec.md §1 declares the pipeline out of scope, specified only as an
//! interface; `arn-core` ships a `FakePipeline` but it's gated behind
//! `test-support` so it isn't available to this binary. `arnd` needs
//! *something* concrete to drive a real run, so this is the minimal
//! collaborator that does nothing but satisfy the trait: no grouping, no
//! per-group preparation, no post-run summarization. A real deployment
//! swaps this crate's dependency for an actual pipeline implementation.

use std::sync::Arc;

use parking_lot::Mutex;

use arn_core::image_set::ImageSetNumber;
use arn_core::measurements::MeasurementsStore;
use arn_core::pipeline::{Pipeline, PipelineError, PipelineListener};

pub struct NullPipeline {
    blob: String,
    listener: Mutex<Option<PipelineListener>>,
}

impl NullPipeline {
    pub fn new(blob: impl Into<String>) -> Self {
        Self {
            blob: blob.into(),
            listener: Mutex::new(None),
        }
    }
}

impl Pipeline for NullPipeline {
    fn clone_pipeline(&self) -> Box<dyn Pipeline> {
        Box::new(Self {
            blob: self.blob.clone(),
            listener: Mutex::new(self.listener.lock().clone()),
        })
    }

    fn serialize_to_text(&self) -> String {
        self.blob.clone()
    }

    fn set_listener(&self, listener: PipelineListener) {
        *self.listener.lock() = Some(listener);
    }

    fn prepare_run(&self, _store: &mut dyn MeasurementsStore) -> Result<(), PipelineError> {
        Ok(())
    }

    fn prepare_group(
        &self,
        _key: &str,
        _image_sets: &[ImageSetNumber],
    ) -> Result<bool, PipelineError> {
        Ok(true)
    }

    fn post_group(&self, _key: &str) {}

    fn post_run(&self, _store: &mut dyn MeasurementsStore) {}

    fn declares_grouping(&self, _store: &dyn MeasurementsStore) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arn_core::measurements::FlatFileMeasurementsStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn clone_is_independent_and_preserves_the_blob() {
        let pipeline = NullPipeline::new("pipeline-text");
        let clone = pipeline.clone_pipeline();
        assert_eq!(clone.serialize_to_text(), "pipeline-text");
    }

    #[test]
    fn declares_no_grouping_and_accepts_every_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store =
            FlatFileMeasurementsStore::create(dir.path().join("m.store")).expect("create");
        let pipeline = NullPipeline::new("blob");
        assert!(!pipeline.declares_grouping(&store));
        assert!(pipeline.prepare_group("", &[]).expect("prepare_group"));
        pipeline.post_group("");
        pipeline.post_run(&mut store);
    }

    #[test]
    fn listener_is_stored_but_never_invoked_by_this_pipeline() {
        let pipeline = NullPipeline::new("blob");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        pipeline.set_listener(Arc::new(move |_event| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
