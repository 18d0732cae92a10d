//! spec.md §8 scenario 2: three image sets, no grouping, pause mid-run.

use arn_announcer::fake::FakeAnnounceBus;
use arn_core::test_support::RecordingSink;
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn pausing_mid_run_halts_progress_until_resumed() {
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
    analysis.start(options, sink.as_sink()).expect("start");

    let addr = wait_for_live_endpoint(&announce_bus).await;

    // Complete the first job, then wait for its Progress to land before
    // pausing — "call pause() after first Progress" (spec.md scenario 2).
    let (_, first_images) = poll_for_work(addr).await;
    report_done(addr, dir.path(), "job1", &first_images).await;
    wait_until(|| count_events(&sink, "AnalysisProgress") >= 2).await;

    analysis.pause().expect("pause");
    wait_until(|| has_event(&sink, "AnalysisPaused")).await;
    // The pause wake fires one final, identical tally as the controller's
    // loop notices `paused` and settles into its wait; after that settles
    // the tally itself does not move (no job can complete while paused).
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let progress_at_pause = count_events(&sink, "AnalysisProgress");
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(count_events(&sink, "AnalysisProgress"), progress_at_pause);
    assert!(!has_event(&sink, "AnalysisFinished"));

    analysis.resume().expect("resume");
    wait_until(|| has_event(&sink, "AnalysisResumed")).await;

    let (_, second_images) = poll_for_work(addr).await;
    report_done(addr, dir.path(), "job2", &second_images).await;
    let (_, third_images) = poll_for_work(addr).await;
    report_done(addr, dir.path(), "job3", &third_images).await;

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;
    assert!(sink
        .snapshot()
        .iter()
        .any(|e| e.starts_with("AnalysisFinished") && e.contains("cancelled=false")));
}
