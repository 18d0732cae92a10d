//! spec.md §8 scenario 6: the pipeline's `prepare_group` hook refuses.
//!
//! Expect an immediate self-cancel with no jobs ever enqueued — a WORK
//! request sees `NONE` from the first ask — and exactly one
//! `AnalysisProgress` (the step 4 reset tally) before
//! `AnalysisFinished{cancelled=true}`.

use arn_announcer::fake::FakeAnnounceBus;
use arn_boundary::protocol::{RequestBody, ResponseBody, WireJobType};
use arn_core::test_support::{FakePipeline, RecordingSink};
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn a_refused_prepare_group_self_cancels_before_any_job_is_enqueued() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_with_image_sets(&dir.path().join("initial.store"), &[1, 2, 3]);

    let announce_bus = FakeAnnounceBus::new();
    let pipeline = FakePipeline::new(false).refusing_prepare_group();
    let analysis = new_analysis_with_pipeline(dir.path(), store, pipeline, &announce_bus);

    let sink = RecordingSink::new();
    let options = ControllerOptions {
        image_set_start: Some(1),
        image_set_end: Some(4),
        overwrite: false,
    };
    analysis.start(options, sink.as_sink()).expect("start");

    let addr = wait_for_live_endpoint(&announce_bus).await;

    let reply = ask(addr, RequestBody::Work).await;
    assert!(matches!(
        reply,
        ResponseBody::Work {
            jobtype: WireJobType::None,
            ..
        }
    ));

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;

    assert!(sink
        .snapshot()
        .iter()
        .any(|e| e.starts_with("AnalysisFinished") && e.contains("cancelled=true")));
    assert_eq!(count_events(&sink, "AnalysisProgress"), 1);
}
