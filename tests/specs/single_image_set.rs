//! spec.md §8 scenario 1: single image set, no grouping.

use std::sync::Arc;

use arn_announcer::fake::FakeAnnounceBus;
use arn_core::test_support::RecordingSink;
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn single_image_set_reaches_finished_without_cancellation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_with_image_sets(&dir.path().join("initial.store"), &[1]);

    let announce_bus = FakeAnnounceBus::new();
    let analysis = new_analysis(dir.path(), store, false, &announce_bus);

    let sink = RecordingSink::new();
    let options = ControllerOptions {
        image_set_start: Some(1),
        image_set_end: Some(2),
        overwrite: false,
    };
    analysis.start(options, sink.as_sink()).expect("start");

    let addr = wait_for_live_endpoint(&announce_bus).await;
    let (jobtype, images) = poll_for_work(addr).await;
    assert_eq!(jobtype, arn_boundary::protocol::WireJobType::Image);
    assert_eq!(images, "1");

    report_done(addr, dir.path(), "job1", &images).await;

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;

    let snapshot = sink.snapshot();
    assert!(snapshot.iter().any(|e| e.starts_with("AnalysisStarted")));
    assert!(snapshot
        .iter()
        .any(|e| e.starts_with("AnalysisFinished") && e.contains("cancelled=false")));
    // Only one job existed for this run's window, so the single WORK
    // reply we already consumed emptied `work_queue` before Finished
    // fired (spec.md scenario 1: "work_queue emptied before Finished").

    let _ = Arc::clone(&announce_bus);
}
