//! spec.md §8 scenario 3: grouped run.
//!
//! Store declares groups `{A:[1,2], B:[3]}`. Expect exactly two WORK
//! replies, one GROUP with images "1,2" and one GROUP with images "3".

use arn_announcer::fake::FakeAnnounceBus;
use arn_boundary::protocol::WireJobType;
use arn_core::test_support::RecordingSink;
use arn_runner::ControllerOptions;

use crate::prelude::*;

#[tokio::test]
async fn grouped_store_yields_one_group_job_per_group_number() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = grouped_store(
        &dir.path().join("initial.store"),
        &[(1, &[1, 2]), (2, &[3])],
    );

    let announce_bus = FakeAnnounceBus::new();
    let analysis = new_analysis(dir.path(), store, true, &announce_bus);

    let sink = RecordingSink::new();
    let options = ControllerOptions {
        image_set_start: Some(1),
        image_set_end: Some(4),
        overwrite: false,
    };
    analysis.start(options, sink.as_sink()).expect("start");

    let addr = wait_for_live_endpoint(&announce_bus).await;

    let first = poll_for_work(addr).await;
    let second = poll_for_work(addr).await;

    // Both groups were dispatched; the queue should now be dry (checked
    // while the run is still in progress, before either job is reported,
    // so the job server is certainly still serving requests).
    let third = ask(addr, arn_boundary::protocol::RequestBody::Work).await;
    assert!(matches!(
        third,
        arn_boundary::protocol::ResponseBody::Work {
            jobtype: WireJobType::None,
            ..
        }
    ));

    report_done(addr, dir.path(), "group1", &first.1).await;
    report_done(addr, dir.path(), "group2", &second.1).await;

    wait_until(|| has_event(&sink, "AnalysisFinished")).await;

    let mut images: Vec<String> = vec![first.1, second.1];
    images.sort();
    assert_eq!(images, vec!["1,2".to_string(), "3".to_string()]);
    assert_eq!(first.0, WireJobType::Group);
    assert_eq!(second.0, WireJobType::Group);
}
