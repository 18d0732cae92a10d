// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! arn-announcer: broadcasts available-work notices so workers can locate
//! active analyses (spec.md §4.6).
//!
//! The announcer is a process-wide singleton (spec.md §5: "never
//! cancelled in the core's lifetime"). It owns one PUB-style TCP endpoint;
//! workers connect as subscribers and receive every message published
//! from then on — re-announcement at the job server's 1-second cadence
//! (spec.md §4.3) means a subscriber that connects late still sees a live
//! analysis within a second.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use arn_boundary::wire;
use arn_core::id::AnalysisId;

/// A message published on the announce channel (spec.md §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnounceMessage {
    /// `(endpoint, analysis_id)` for a live run.
    Live {
        endpoint: String,
        analysis_id: AnalysisId,
    },
    /// `("DONE", analysis_id)` once a run's job server loop has exited.
    Done { analysis_id: AnalysisId },
}

/// Capability interface injected into the job server (spec.md §9 redesign
/// note: "Replace with an injected `AnnounceBus` capability interface").
pub trait AnnounceBus: Send + Sync {
    fn publish(&self, endpoint: String, analysis_id: AnalysisId);
    fn publish_done(&self, analysis_id: AnalysisId);
}

/// Live TCP-backed announce bus: a queue feeding a broadcast fanout to
/// every subscriber connection.
pub struct TcpAnnounceBus {
    local_addr: SocketAddr,
    queue_tx: mpsc::Sender<AnnounceMessage>,
    _pump_task: JoinHandle<()>,
    _accept_task: JoinHandle<()>,
}

impl TcpAnnounceBus {
    pub async fn bind() -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;

        let (queue_tx, mut queue_rx) = mpsc::channel::<AnnounceMessage>(64);
        let (broadcast_tx, _) = broadcast::channel::<AnnounceMessage>(64);

        let pump_broadcast = broadcast_tx.clone();
        let pump_task = tokio::spawn(async move {
            while let Some(msg) = queue_rx.recv().await {
                // No subscribers is not an error: workers may not have
                // connected yet, and re-announcement will catch up.
                let _ = pump_broadcast.send(msg);
            }
        });

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _peer)) => {
                        let rx = broadcast_tx.subscribe();
                        tokio::spawn(serve_subscriber(stream, rx));
                    }
                    Err(e) => {
                        warn!(error = %e, "announcer accept failed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            queue_tx,
            _pump_task: pump_task,
            _accept_task: accept_task,
        })
    }

    pub fn subscriber_endpoint(&self) -> String {
        format!("tcp://{}", self.local_addr)
    }
}

impl AnnounceBus for TcpAnnounceBus {
    fn publish(&self, endpoint: String, analysis_id: AnalysisId) {
        let _ = self.queue_tx.try_send(AnnounceMessage::Live {
            endpoint,
            analysis_id,
        });
    }

    fn publish_done(&self, analysis_id: AnalysisId) {
        let _ = self.queue_tx.try_send(AnnounceMessage::Done { analysis_id });
    }
}

async fn serve_subscriber(mut stream: TcpStream, mut rx: broadcast::Receiver<AnnounceMessage>) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let Ok(encoded) = wire::encode(&msg) else {
                    continue;
                };
                if wire::write_message(&mut stream, &encoded).await.is_err() {
                    debug!("announce subscriber disconnected");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// In-memory announce bus for controller/job-server unit tests.
    #[derive(Default)]
    pub struct FakeAnnounceBus {
        pub published: Mutex<Vec<AnnounceMessage>>,
    }

    impl FakeAnnounceBus {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn snapshot(&self) -> Vec<AnnounceMessage> {
            self.published.lock().clone()
        }
    }

    impl AnnounceBus for FakeAnnounceBus {
        fn publish(&self, endpoint: String, analysis_id: AnalysisId) {
            self.published.lock().push(AnnounceMessage::Live {
                endpoint,
                analysis_id,
            });
        }

        fn publish_done(&self, analysis_id: AnalysisId) {
            self.published
                .lock()
                .push(AnnounceMessage::Done { analysis_id });
        }
    }
}
