// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events posted to the front end (spec.md §6).

use std::collections::HashMap;
use std::sync::Arc;

use crate::id::AnalysisId;
use crate::image_set::ImageSetStatus;
use crate::pipeline::PipelineEvent;

/// A reply handle for a forwarded request the front end owns the
/// response to (spec.md §4.3: "the front end owns the reply").
///
/// Boxed so `AnalysisEvent` doesn't need to be generic over the
/// boundary crate's reply-channel type.
pub trait ReplyHandle: Send {
    fn reply(self: Box<Self>, payload: Vec<u8>);
}

/// Lifecycle events emitted by the controller and job server
/// (spec.md §4.2, §4.3, §6).
pub enum AnalysisEvent {
    AnalysisStarted {
        analysis_id: AnalysisId,
    },
    AnalysisProgress {
        analysis_id: AnalysisId,
        counts: HashMap<ImageSetStatus, usize>,
    },
    AnalysisPaused {
        analysis_id: AnalysisId,
    },
    AnalysisResumed {
        analysis_id: AnalysisId,
    },
    AnalysisCancelled {
        analysis_id: AnalysisId,
    },
    AnalysisFinished {
        analysis_id: AnalysisId,
        cancelled: bool,
    },
    /// A pipeline-internal event, forwarded verbatim (spec.md §4.2 step 2).
    Pipeline {
        analysis_id: AnalysisId,
        event: PipelineEvent,
    },
    /// Forwarded requests the front end must reply to (spec.md §4.3 table,
    /// §6 "carry a reply handle the front end must complete").
    Interaction {
        analysis_id: AnalysisId,
        payload: Vec<u8>,
        reply: Box<dyn ReplyHandle>,
    },
    Display {
        analysis_id: AnalysisId,
        payload: Vec<u8>,
        reply: Box<dyn ReplyHandle>,
    },
    Exception {
        analysis_id: AnalysisId,
        payload: Vec<u8>,
        reply: Box<dyn ReplyHandle>,
    },
}

impl std::fmt::Debug for AnalysisEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisEvent::AnalysisStarted { analysis_id } => {
                write!(f, "AnalysisStarted({analysis_id})")
            }
            AnalysisEvent::AnalysisProgress { analysis_id, counts } => {
                write!(f, "AnalysisProgress({analysis_id}, {counts:?})")
            }
            AnalysisEvent::AnalysisPaused { analysis_id } => {
                write!(f, "AnalysisPaused({analysis_id})")
            }
            AnalysisEvent::AnalysisResumed { analysis_id } => {
                write!(f, "AnalysisResumed({analysis_id})")
            }
            AnalysisEvent::AnalysisCancelled { analysis_id } => {
                write!(f, "AnalysisCancelled({analysis_id})")
            }
            AnalysisEvent::AnalysisFinished {
                analysis_id,
                cancelled,
            } => write!(f, "AnalysisFinished({analysis_id}, cancelled={cancelled})"),
            AnalysisEvent::Pipeline { analysis_id, event } => {
                write!(f, "Pipeline({analysis_id}, {event:?})")
            }
            AnalysisEvent::Interaction { analysis_id, .. } => {
                write!(f, "Interaction({analysis_id})")
            }
            AnalysisEvent::Display { analysis_id, .. } => write!(f, "Display({analysis_id})"),
            AnalysisEvent::Exception { analysis_id, .. } => write!(f, "Exception({analysis_id})"),
        }
    }
}

/// A sink the controller/job server post lifecycle events to. The actual
/// GUI/CLI front end (spec.md §1: out of scope) implements this.
pub type EventSink = Arc<dyn Fn(AnalysisEvent) + Send + Sync>;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// An `EventSink` that records every event's debug string, for
    /// assertions in controller/job-server tests.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn as_sink(self: &Arc<Self>) -> EventSink {
            let this = Arc::clone(self);
            Arc::new(move |event: AnalysisEvent| {
                this.events.lock().push(format!("{event:?}"));
            })
        }

        pub fn snapshot(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    /// A no-op reply handle for tests that don't need to observe the
    /// reply payload.
    pub struct NullReply;

    impl ReplyHandle for NullReply {
        fn reply(self: Box<Self>, _payload: Vec<u8>) {}
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingSink::new();
        let emit = sink.as_sink();
        let id = AnalysisId::new();
        emit(AnalysisEvent::AnalysisStarted { analysis_id: id });
        emit(AnalysisEvent::AnalysisCancelled { analysis_id: id });
        let snapshot = sink.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].starts_with("AnalysisStarted"));
        assert!(snapshot[1].starts_with("AnalysisCancelled"));
    }
}
