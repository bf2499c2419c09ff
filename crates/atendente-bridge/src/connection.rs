// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One open bridge socket.
//!
//! A writer task drains an mpsc queue into the WebSocket sink. A reader task
//! turns server frames into [`TransportEvent`]s and resolves pending requests
//! through oneshot channels keyed by request id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use atendente_core::AtendenteError;
use atendente_core::traits::TransportHandle;
use atendente_core::types::{
    CloseReason, MediaBlob, Presence, SentReceipt, SessionId, TransportEvent,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::protocol::{ClientFrame, Incoming, Reply, ServerFrame};

type PendingMap = Arc<DashMap<String, oneshot::Sender<Reply>>>;

pub struct BridgeHandle {
    session_id: SessionId,
    outgoing: mpsc::Sender<Message>,
    pending: PendingMap,
    request_timeout: Duration,
    closed: AtomicBool,
    reader: AbortHandle,
}

impl BridgeHandle {
    /// Spawns the reader and writer tasks over an upgraded socket.
    pub(crate) fn spawn<S, K>(
        session_id: SessionId,
        sink: K,
        stream: S,
        events: mpsc::Sender<TransportEvent>,
        request_timeout: Duration,
    ) -> Self
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Send
            + Unpin
            + 'static,
        K: futures::Sink<Message> + Send + Unpin + 'static,
    {
        let (outgoing, queue) = mpsc::channel::<Message>(64);
        let pending: PendingMap = Arc::new(DashMap::new());

        tokio::spawn(write_loop(sink, queue));
        let reader = tokio::spawn(read_loop(
            session_id.clone(),
            stream,
            events,
            Arc::clone(&pending),
        ))
        .abort_handle();

        Self {
            session_id,
            outgoing,
            pending,
            request_timeout,
            closed: AtomicBool::new(false),
            reader,
        }
    }

    pub(crate) async fn send_frame(&self, frame: &ClientFrame) -> Result<(), AtendenteError> {
        let json = serde_json::to_string(frame)
            .map_err(|e| AtendenteError::Internal(format!("failed to encode bridge frame: {e}")))?;
        self.outgoing
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| AtendenteError::transport("bridge socket closed"))
    }

    /// Sends a request frame and waits for its correlated reply.
    async fn request(
        &self,
        build: impl FnOnce(String) -> ClientFrame,
    ) -> Result<Reply, AtendenteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AtendenteError::SessionNotFound(self.session_id.to_string()));
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        if let Err(e) = self.send_frame(&build(request_id.clone())).await {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Reply::Error(message))) => Err(AtendenteError::transport(message)),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(AtendenteError::transport(
                "bridge connection closed before reply",
            )),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(AtendenteError::Timeout {
                    duration: self.request_timeout,
                })
            }
        }
    }
}

fn unexpected(reply: Reply) -> AtendenteError {
    AtendenteError::transport(format!("unexpected bridge reply: {reply:?}"))
}

#[async_trait]
impl TransportHandle for BridgeHandle {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<SentReceipt, AtendenteError> {
        let reply = self
            .request(|request_id| ClientFrame::SendText {
                request_id,
                to: recipient.to_string(),
                text: text.to_string(),
            })
            .await?;
        match reply {
            Reply::Ack { message_id } => Ok(SentReceipt { message_id }),
            other => Err(unexpected(other)),
        }
    }

    async fn set_presence(
        &self,
        recipient: &str,
        presence: Presence,
    ) -> Result<(), AtendenteError> {
        let reply = self
            .request(|request_id| ClientFrame::Presence {
                request_id,
                to: recipient.to_string(),
                presence,
            })
            .await?;
        match reply {
            Reply::Ack { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn download_media(&self, raw: &serde_json::Value) -> Result<MediaBlob, AtendenteError> {
        let reply = self
            .request(|request_id| ClientFrame::Download {
                request_id,
                message: raw.clone(),
            })
            .await?;
        match reply {
            Reply::Media { mime_type, data } => {
                let data = STANDARD.decode(data.as_bytes()).map_err(|e| {
                    AtendenteError::Transport {
                        message: "bridge returned invalid base64 media".into(),
                        source: Some(Box::new(e)),
                    }
                })?;
                Ok(MediaBlob { mime_type, data })
            }
            other => Err(unexpected(other)),
        }
    }

    async fn logout(&self) -> Result<(), AtendenteError> {
        match self
            .request(|request_id| ClientFrame::Logout { request_id })
            .await?
        {
            Reply::Ack { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(session_id = %self.session_id, "closing bridge socket");
        self.reader.abort();
        // Dropping the senders fails every in-flight request.
        self.pending.clear();
        let _ = self.outgoing.send(Message::Close(None)).await;
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn write_loop<K>(mut sink: K, mut queue: mpsc::Receiver<Message>)
where
    K: futures::Sink<Message> + Unpin,
{
    while let Some(message) = queue.recv().await {
        let closing = matches!(message, Message::Close(_));
        if sink.send(message).await.is_err() || closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<S>(
    session_id: SessionId,
    mut stream: S,
    events: mpsc::Sender<TransportEvent>,
    pending: PendingMap,
) where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let reason = loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                let detail = frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "bridge closed the socket".into());
                break CloseReason::ConnectionLost(detail);
            }
            // Ping/pong is answered by tungstenite; binary frames are not part of the protocol.
            Some(Ok(_)) => continue,
            Some(Err(e)) => break CloseReason::ConnectionLost(e.to_string()),
            None => break CloseReason::ConnectionLost("bridge connection ended".into()),
        };

        let frame: ServerFrame = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %session_id, "invalid bridge frame: {e}");
                continue;
            }
        };

        match Incoming::from(frame) {
            Incoming::Reply { request_id, reply } => {
                match pending.remove(&request_id) {
                    Some((_, waiter)) => {
                        let _ = waiter.send(reply);
                    }
                    None => {
                        debug!(session_id = %session_id, request_id = %request_id, "reply for unknown request");
                    }
                }
            }
            Incoming::Notice(message) => {
                warn!(session_id = %session_id, error = %message, "bridge reported an error");
            }
            Incoming::Event(event) => {
                let is_close = matches!(event, TransportEvent::Closed(_));
                if events.send(event).await.is_err() || is_close {
                    pending.clear();
                    return;
                }
            }
        }
    };

    pending.clear();
    debug!(session_id = %session_id, ?reason, "bridge socket closed");
    let _ = events.send(TransportEvent::Closed(reason)).await;
}
