//! spec.md §8 scenario 5: a worker reports an image set that is not part
//! of this run (`image_set_numbers="99"` with a window of `[1, 2)`).
//! The report is still acked and loaded — the wire contract has no NACK
//! path — but advancing status for an out-of-window image set has no
//! effect on this run's own tally, so completion is still reached for
//! the legitimate image set once it, too, is reported.

use arn_announcer::fake::FakeAnnounceBus;
use arn_core::test_support::RecordingSink;
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn a_report_for_an_unknown_image_set_is_abandoned_not_retried() {
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
    let (_, legit_images) = poll_for_work(addr).await;
    assert_eq!(legit_images, "1");

    // Report against image set 99, which this run never enqueued. The
    // MEASUREMENTS request itself is still acked (the wire contract has
    // no separate NACK path); the load of image set 99's report simply
    // does not advance any status this run tracks.
    report_done(addr, dir.path(), "stray", "99").await;

    // The real job (image set 1) is still outstanding; complete it.
    report_done(addr, dir.path(), "legit", &legit_images).await;

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;
    assert!(sink
        .snapshot()
        .iter()
        .any(|e| e.starts_with("AnalysisFinished") && e.contains("cancelled=false")));
}
