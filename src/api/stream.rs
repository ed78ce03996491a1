//! One chat turn as a cancelable stream of [`TurnEvent`]s.
//!
//! [`ApiClient::send_message_stream`] spawns a task that posts the message,
//! reads the SSE body chunk by chunk and pushes decoded events into a bounded
//! channel. The consumer either pulls them from the returned [`TurnStream`] or
//! registers [`StreamCallbacks`] through [`ApiClient::send_message_with`].
//!
//! Cancellation is cooperative. The reader checks the token between reads and
//! drops the response (closing the connection) when it fires; the consumer
//! side checks it before every delivery, so nothing is observed after
//! `cancel()` returns. Cancellation is never reported as an error.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use super::events::{decode_frame, TurnEvent};
use super::types::{RetrievalTrace, StreamRequest, ToolCall, ToolComplete, ToolStart, TurnSummary};
use super::{ApiClient, Credential, ACCESS_CODE_HEADER};
use crate::sse::{SseDecoder, SseFrame};

const EVENT_BUFFER: usize = 64;

/// Aborts the turn it was taken from. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Events of one turn, ending after `Done`, `Error`, or cancellation.
///
/// Dropping the stream cancels the turn.
#[derive(Debug)]
pub struct TurnStream {
    rx: mpsc::Receiver<TurnEvent>,
    cancel: CancelHandle,
}

impl TurnStream {
    /// The next event, or `None` once the turn is over or was cancelled.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.token.cancelled() => None,
            event = self.rx.recv() => event.filter(|_| !self.cancel.is_cancelled()),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Stream for TurnStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TurnEvent>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(_)) if self.cancel.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Callback style consumer of a turn. Every method defaults to a no-op.
pub trait StreamCallbacks: Send + 'static {
    fn on_retrieval_trace(&mut self, _trace: &RetrievalTrace) {}
    fn on_tool_calls(&mut self, _calls: &[ToolCall]) {}
    fn on_tool_start(&mut self, _start: &ToolStart) {}
    fn on_tool_complete(&mut self, _complete: &ToolComplete) {}
    fn on_content(&mut self, _delta: &str) {}
    fn on_done(&mut self, _summary: &TurnSummary) {}
    fn on_error(&mut self, _error: &ApiError) {}
}

/// Route one event to the matching callback.
pub fn dispatch<C: StreamCallbacks + ?Sized>(callbacks: &mut C, event: &TurnEvent) {
    match event {
        TurnEvent::RetrievalTrace(trace) => callbacks.on_retrieval_trace(trace),
        TurnEvent::ToolCalls(calls) => callbacks.on_tool_calls(calls),
        TurnEvent::ToolStart(start) => callbacks.on_tool_start(start),
        TurnEvent::ToolComplete(complete) => callbacks.on_tool_complete(complete),
        TurnEvent::Content(delta) => callbacks.on_content(delta),
        TurnEvent::Done(summary) => callbacks.on_done(summary),
        TurnEvent::Error(error) => callbacks.on_error(error),
    }
}

/// A turn driven by callbacks.
#[derive(Debug)]
pub struct TurnHandle {
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

impl TurnHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait until the last callback for this turn has run.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "turn callback task failed");
        }
    }
}

impl ApiClient {
    /// Start a turn and return its event stream.
    ///
    /// Without a stored access code the stream yields a single
    /// [`ApiError::MissingAccessCode`] and no request is made. Must be called
    /// inside a Tokio runtime.
    pub fn send_message_stream(&self, message: &str) -> TurnStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancelHandle::default();

        match self.store.access_code() {
            Some(access_code) => {
                let client = self.clone();
                let message = message.to_string();
                let token = cancel.token.clone();
                tokio::spawn(async move {
                    read_turn(client, access_code, message, tx, token).await;
                });
            }
            None => {
                let _ = tx.try_send(TurnEvent::Error(ApiError::MissingAccessCode));
            }
        }

        TurnStream { rx, cancel }
    }

    /// Start a turn and feed its events to `callbacks` on a background task.
    pub fn send_message_with<C: StreamCallbacks>(&self, message: &str, mut callbacks: C) -> TurnHandle {
        let mut stream = self.send_message_stream(message);
        let cancel = stream.cancel_handle();

        let task = tokio::spawn(async move {
            while let Some(event) = stream.next_event().await {
                if stream.cancel.is_cancelled() {
                    break;
                }
                dispatch(&mut callbacks, &event);
            }
        });

        TurnHandle { cancel, task }
    }
}

/// Push `event` unless the turn was cancelled or the consumer went away.
async fn emit(tx: &mpsc::Sender<TurnEvent>, token: &CancellationToken, event: TurnEvent) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

async fn read_turn(
    client: ApiClient,
    access_code: String,
    message: String,
    tx: mpsc::Sender<TurnEvent>,
    token: CancellationToken,
) {
    let request = client
        .http
        .post(client.url("/chat/stream"))
        .header(ACCESS_CODE_HEADER, &access_code)
        .json(&StreamRequest {
            message: &message,
            session_id: client.store.session_id(),
        });

    let sent = tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!("stream aborted before response");
            return;
        }
        sent = request.send() => sent,
    };

    let response = match sent {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "stream request failed");
            emit(&tx, &token, TurnEvent::Error(ApiError::ConnectionLost)).await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            error = client.failure(response, "Stream request failed", Credential::Stored) => error,
        };
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            tracing::warn!(status = %status, error = %error, "stream request rejected");
        }
        emit(&tx, &token, TurnEvent::Error(error)).await;
        return;
    }

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("stream aborted");
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                if deliver(&client, &tx, &token, decoder.push(&bytes)).await {
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "stream read failed");
                emit(&tx, &token, TurnEvent::Error(ApiError::ConnectionLost)).await;
                return;
            }
            None => {
                if deliver(&client, &tx, &token, decoder.finish()).await {
                    return;
                }
                if decoder.pending() > 0 {
                    tracing::debug!(bytes = decoder.pending(), "discarding unterminated trailing event");
                }
                tracing::warn!("stream closed before the turn finished");
                emit(&tx, &token, TurnEvent::Error(ApiError::ConnectionLost)).await;
                return;
            }
        }
    }
}

/// Decode and forward `frames`. Returns `true` once the turn is over: a
/// terminal event went out, the turn was cancelled, or the consumer left.
async fn deliver(
    client: &ApiClient,
    tx: &mpsc::Sender<TurnEvent>,
    token: &CancellationToken,
    frames: Vec<SseFrame>,
) -> bool {
    for frame in frames {
        let event = match decode_frame(&frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(event = %frame.event, "ignoring unhandled stream event");
                continue;
            }
            Err(e) => {
                tracing::warn!(event = %frame.event, error = %e, "failed to parse stream event, skipping");
                continue;
            }
        };

        if token.is_cancelled() {
            return true;
        }
        if let TurnEvent::Done(summary) = &event {
            if let Some(session_id) = summary.session_id.as_deref().filter(|s| !s.is_empty()) {
                client.store.set_session_id(session_id);
            }
        }

        let terminal = event.is_terminal();
        if !emit(tx, token, event).await || terminal {
            return true;
        }
    }
    false
}
