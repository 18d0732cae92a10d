//! spec.md §8 scenario 4: cancel between start and the first WorkRequest.
//!
//! Expect `AnalysisCancelled` from the job server, `AnalysisFinished
//! {cancelled=true}` from the controller, and exactly one `("DONE", id)`
//! announcement for this run's id.

use arn_announcer::fake::FakeAnnounceBus;
use arn_announcer::AnnounceMessage;
use arn_core::test_support::RecordingSink;
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn cancelling_before_any_work_request_still_finishes_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_with_image_sets(&dir.path().join("initial.store"), &[1, 2, 3]);

    let announce_bus = FakeAnnounceBus::new();
    let analysis = new_analysis(dir.path(), store, false, &announce_bus);

    let sink = RecordingSink::new();
    let options = ControllerOptions {
        image_set_start: Some(1),
        image_set_end: Some(4),
        overwrite: false,
    };
    let analysis_id = analysis.start(options, sink.as_sink()).expect("start");

    // Race: cancel as soon as the endpoint is live, before issuing any
    // WorkRequest at all.
    wait_for_live_endpoint(&announce_bus).await;
    analysis.cancel().expect("cancel");

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;

    assert!(has_event(&sink, "AnalysisCancelled"));
    assert!(sink
        .snapshot()
        .iter()
        .any(|e| e.starts_with("AnalysisFinished") && e.contains("cancelled=true")));

    wait_until(|| {
        announce_bus.snapshot().iter().any(
            |m| matches!(m, AnnounceMessage::Done { analysis_id: id } if *id == analysis_id),
        )
    })
    .await;

    let done_count = announce_bus
        .snapshot()
        .iter()
        .filter(|m| matches!(m, AnnounceMessage::Done { analysis_id: id } if *id == analysis_id))
        .count();
    assert_eq!(done_count, 1);

    // The very last announcement for this id must be the DONE tuple
    // (spec.md §5: "the last announcement published is (\"DONE\", id)").
    let snapshot = announce_bus.snapshot();
    let last_for_id = snapshot
        .iter()
        .rev()
        .find(|m| match m {
            AnnounceMessage::Live { analysis_id: id, .. } => *id == analysis_id,
            AnnounceMessage::Done { analysis_id: id } => *id == analysis_id,
        })
        .expect("at least one announcement for this analysis");
    assert!(matches!(last_for_id, AnnounceMessage::Done { .. }));
}
