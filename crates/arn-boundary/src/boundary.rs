// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request/reply boundary (spec.md §4.4).
//!
//! Binds to a random local port, decodes inbound frames into
//! [`PendingRequest`]s pushed onto a caller-supplied inbox channel, and
//! routes replies posted to each request's handle back to the
//! originating peer. `stop()` refuses new requests, completes any
//! still-waiting peer with `BoundaryExited`, and releases the port.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{RequestEnvelope, ResponseBody, ResponseEnvelope};
use crate::wire::{self, WireError};

/// One inbound request, paired with the means to reply to it.
pub struct PendingRequest {
    pub envelope: RequestEnvelope,
    reply_tx: oneshot::Sender<ResponseBody>,
}

impl PendingRequest {
    pub fn reply(self, body: ResponseBody) {
        // The peer may already be gone (connection dropped); that is not
        // this caller's problem to handle.
        let _ = self.reply_tx.send(body);
    }

    /// Split into the envelope and a detachable reply sender, for
    /// requests the job server forwards elsewhere instead of answering
    /// immediately (spec.md §4.3: "the front end owns the reply").
    pub fn into_parts(self) -> (RequestEnvelope, ReplySender) {
        (self.envelope, ReplySender(self.reply_tx))
    }
}

/// A reply capability detached from its request envelope. Dropping this
/// without calling `send` delivers `BoundaryExited` to the peer, same as
/// dropping an unanswered `PendingRequest` (spec.md §4.4: "cancels any
/// unreplied handles with `BoundaryExited`").
pub struct ReplySender(oneshot::Sender<ResponseBody>);

impl ReplySender {
    pub fn send(self, body: ResponseBody) {
        let _ = self.0.send(body);
    }
}

pub struct Boundary {
    local_addr: SocketAddr,
    stop_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl Boundary {
    /// Bind to a random port on loopback and start accepting connections.
    /// Decoded requests are pushed onto `inbox`.
    pub async fn bind(inbox: mpsc::Sender<PendingRequest>) -> Result<Self, WireError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        let (stop_tx, _) = broadcast::channel(16);
        let accept_stop = stop_tx.clone();

        let accept_task = tokio::spawn(async move {
            let mut stop_rx = accept_stop.subscribe();
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _peer)) => {
                                let inbox = inbox.clone();
                                let stop_tx = accept_stop.clone();
                                tokio::spawn(async move {
                                    handle_connection(stream, inbox, stop_tx).await;
                                });
                            }
                            Err(e) => warn!(error = %e, "boundary accept failed"),
                        }
                    }
                    _ = stop_rx.recv() => {
                        debug!("boundary accept loop stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            stop_tx,
            accept_task,
        })
    }

    /// The endpoint workers should connect to (spec.md §4.4: `request_endpoint`).
    pub fn request_endpoint(&self) -> String {
        format!("tcp://{}", self.local_addr)
    }

    /// Refuse new requests, deliver `BoundaryExited` to every peer still
    /// waiting on a reply, and release the port.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.accept_task.await;
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    inbox: mpsc::Sender<PendingRequest>,
    stop_tx: broadcast::Sender<()>,
) {
    let bytes = match wire::read_message(&mut stream).await {
        Ok(bytes) => bytes,
        Err(WireError::ConnectionClosed) => return,
        Err(e) => {
            warn!(error = %e, "boundary read failed");
            return;
        }
    };
    let envelope: RequestEnvelope = match wire::decode(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed request frame");
            let _ = write_reply(
                &mut stream,
                arn_core::id::CorrelationId::new(),
                ResponseBody::Error {
                    message: "malformed request frame".to_string(),
                },
            )
            .await;
            return;
        }
    };
    let correlation_id = envelope.correlation_id;
    let (reply_tx, reply_rx) = oneshot::channel();
    let pending = PendingRequest { envelope, reply_tx };

    if inbox.send(pending).await.is_err() {
        let _ = write_reply(&mut stream, correlation_id, ResponseBody::BoundaryExited).await;
        return;
    }

    let mut stop_rx = stop_tx.subscribe();
    let body = tokio::select! {
        reply = reply_rx => reply.unwrap_or(ResponseBody::BoundaryExited),
        _ = stop_rx.recv() => ResponseBody::BoundaryExited,
    };
    let _ = write_reply(&mut stream, correlation_id, body).await;
}

async fn write_reply(
    stream: &mut TcpStream,
    correlation_id: arn_core::id::CorrelationId,
    body: ResponseBody,
) -> Result<(), WireError> {
    let envelope = ResponseEnvelope { correlation_id, body };
    let encoded = wire::encode(&envelope)?;
    wire::write_message(stream, &encoded).await
}
