// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! arnd: the daemon binary wiring the announcer, worker supervisor and
//! control plane together (spec.md §4).

pub mod config;
pub mod control;
pub mod pipeline;

use tracing::info;

use arn_core::event::{AnalysisEvent, EventSink, ReplyHandle};

/// The default event sink: logs every lifecycle event, and replies with
/// an empty payload to any forwarded Interaction/Display/Exception
/// request so a worker waiting on a reply is never left hanging (spec.md
/// §1: the real GUI/CLI front end that would answer these is out of
/// scope here).
pub fn logging_sink() -> EventSink {
    std::sync::Arc::new(|event: AnalysisEvent| match event {
        AnalysisEvent::Interaction { analysis_id, reply, .. } => {
            info!(%analysis_id, "interaction forwarded; no front end attached, replying empty");
            reply.reply(Vec::new());
        }
        AnalysisEvent::Display { analysis_id, reply, .. } => {
            info!(%analysis_id, "display forwarded; no front end attached, replying empty");
            reply.reply(Vec::new());
        }
        AnalysisEvent::Exception { analysis_id, reply, .. } => {
            info!(%analysis_id, "exception forwarded; no front end attached, replying empty");
            reply.reply(Vec::new());
        }
        other => info!("{other:?}"),
    })
}
