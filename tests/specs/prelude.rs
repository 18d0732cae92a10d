//! Shared harness for the end-to-end scenarios in spec.md §8.
//!
//! Each scenario drives a real `Analysis` through its public facade and
//! stands in for a worker by speaking the boundary's wire protocol
//! directly over a loopback `TcpStream` — there is no real worker
//! subprocess in these tests, only the announce/boundary/controller
//! machinery spec.md calls "the hard part".

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::sleep;

use arn_announcer::fake::FakeAnnounceBus;
use arn_announcer::{AnnounceBus, AnnounceMessage};
use arn_boundary::protocol::{RequestBody, RequestEnvelope, ResponseBody, ResponseEnvelope};
use arn_boundary::wire;
use arn_core::id::CorrelationId;
use arn_core::image_set::ImageSetNumber;
use arn_core::measurements::{FlatFileMeasurementsStore, MeasurementsStore};
use arn_core::test_support::{FakePipeline, RecordingSink};
use arn_runner::{Analysis, ControllerOptions};
use arn_supervisor::{WorkerSupervisor, WorkerSupervisorConfig};

/// A supervisor with zero real workers: these scenarios stand in for
/// workers themselves, and the controller's "all workers dead" liveness
/// check (spec.md §9) only applies once `worker_count() > 0`.
pub fn no_worker_supervisor() -> Arc<WorkerSupervisor> {
    WorkerSupervisor::new(WorkerSupervisorConfig {
        worker_binary: "true".into(),
        worker_count: 0,
        extra_args: Vec::new(),
        shutdown_grace: Duration::from_millis(200),
    })
}

pub fn store_with_image_sets(path: &Path, numbers: &[u32]) -> FlatFileMeasurementsStore {
    let mut store = FlatFileMeasurementsStore::create(path).expect("create store");
    for &n in numbers {
        store.write(
            "Image",
            "Status",
            ImageSetNumber(n),
            "unprocessed".to_string(),
        );
    }
    store.flush().expect("flush initial store");
    FlatFileMeasurementsStore::load(path).expect("reload initial store")
}

pub fn grouped_store(path: &Path, groups: &[(u32, &[u32])]) -> FlatFileMeasurementsStore {
    let mut store = FlatFileMeasurementsStore::create(path).expect("create store");
    for &(group_number, members) in groups {
        for (index, &n) in members.iter().enumerate() {
            let image_set = ImageSetNumber(n);
            store.write("Image", "Status", image_set, "unprocessed".to_string());
            store.write("Image", "Group_Number", image_set, group_number.to_string());
            store.write("Image", "Group_Index", image_set, index.to_string());
        }
    }
    store.flush().expect("flush initial store");
    FlatFileMeasurementsStore::load(path).expect("reload initial store")
}

pub fn new_analysis(
    dir: &Path,
    store: FlatFileMeasurementsStore,
    grouping: bool,
    announce_bus: &Arc<FakeAnnounceBus>,
) -> Analysis {
    Analysis::new(
        Box::new(FakePipeline::new(grouping)),
        Box::new(store),
        dir.to_path_buf(),
        Arc::clone(announce_bus) as Arc<dyn AnnounceBus>,
        no_worker_supervisor(),
    )
}

pub fn new_analysis_with_pipeline(
    dir: &Path,
    store: FlatFileMeasurementsStore,
    pipeline: FakePipeline,
    announce_bus: &Arc<FakeAnnounceBus>,
) -> Analysis {
    Analysis::new(
        Box::new(pipeline),
        Box::new(store),
        dir.to_path_buf(),
        Arc::clone(announce_bus) as Arc<dyn AnnounceBus>,
        no_worker_supervisor(),
    )
}

/// Poll the fake announce bus until it has published a live endpoint for
/// this run, the way a real worker would learn it from the PUB channel
/// (spec.md §4.6).
pub async fn wait_for_live_endpoint(announce_bus: &FakeAnnounceBus) -> SocketAddr {
    for _ in 0..500 {
        for msg in announce_bus.snapshot() {
            if let AnnounceMessage::Live { endpoint, .. } = msg {
                return endpoint
                    .strip_prefix("tcp://")
                    .expect("endpoint is a tcp:// url")
                    .parse()
                    .expect("endpoint parses as a socket address");
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("no live announcement observed within the deadline");
}

pub async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition was not met within the deadline");
}

pub fn has_event(sink: &RecordingSink, prefix: &str) -> bool {
    sink.snapshot().iter().any(|e| e.starts_with(prefix))
}

pub fn count_events(sink: &RecordingSink, prefix: &str) -> usize {
    sink.snapshot().iter().filter(|e| e.starts_with(prefix)).count()
}

/// Send one boundary request over a fresh connection and return the reply
/// (spec.md §4.4: one request/reply round trip per connection in this
/// harness, mirroring how the job server test in `arn-runner` drives it).
pub async fn ask(addr: SocketAddr, body: RequestBody) -> ResponseBody {
    let mut stream = TcpStream::connect(addr).await.expect("connect to job server");
    let envelope = RequestEnvelope {
        correlation_id: CorrelationId::new(),
        body,
    };
    let encoded = wire::encode(&envelope).expect("encode request");
    wire::write_message(&mut stream, &encoded).await.expect("write request");
    let bytes = wire::read_message(&mut stream).await.expect("read reply");
    wire::decode::<ResponseEnvelope>(&bytes).expect("decode reply").body
}

/// Poll `WORK` until a job is handed out, returning its wire fields.
pub async fn poll_for_work(addr: SocketAddr) -> (arn_boundary::protocol::WireJobType, String) {
    for _ in 0..500 {
        if let ResponseBody::Work {
            jobtype,
            images: Some(images),
        } = ask(addr, RequestBody::Work).await
        {
            return (jobtype, images);
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("no work was handed out within the deadline");
}

/// Report a job done: write a one-line measurements file marking every
/// listed image set Done, then send `MEASUREMENTS` (spec.md §6).
pub async fn report_done(addr: SocketAddr, dir: &Path, job_name: &str, image_set_numbers: &str) {
    let path = dir.join(format!("{job_name}.store"));
    let mut store = FlatFileMeasurementsStore::create(&path).expect("create job store");
    for n in image_set_numbers.split(',').filter(|s| !s.is_empty()) {
        let n: u32 = n.parse().expect("image set number");
        store.write("Image", "Done", ImageSetNumber(n), "1".to_string());
    }
    store.flush().expect("flush job store");

    let reply = ask(
        addr,
        RequestBody::Measurements {
            path: path.to_string_lossy().into_owned(),
            image_set_numbers: image_set_numbers.to_string(),
        },
    )
    .await;
    assert!(matches!(reply, ResponseBody::MeasurementsAck { .. }));
}
