//! Conversation view model.
//!
//! [`Conversation`] folds the events of each turn into a list of
//! [`ChatMessage`]s and runs the session lifecycle around them: greeting on
//! start, backend persistence on reset and exit, and the beacon on teardown.
//! The backend stays the system of record; nothing here is persisted.

pub mod tools;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::events::TurnEvent;
use crate::api::stream::{CancelHandle, TurnStream};
use crate::api::types::RetrievalTrace;
use crate::api::ApiClient;
use tools::ToolCallLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "ToolCallLog::is_empty")]
    pub tool_calls: ToolCallLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    pub is_error: bool,
}

impl ChatMessage {
    fn new(id: String, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: ToolCallLog::new(),
            response_time_ms: None,
            is_error: false,
        }
    }
}

/// Fresh, time-sortable message id.
pub fn generate_message_id() -> String {
    format!("msg_{}", uuid::Uuid::now_v7().simple())
}

/// Where the opening assistant message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opening {
    Greeting,
    /// The greeting failed or was empty; the configured intro was shown.
    Intro(Option<ApiError>),
}

#[derive(Debug)]
struct ActiveTurn {
    assistant_id: String,
    cancel: CancelHandle,
}

#[derive(Debug)]
pub struct Conversation {
    client: ApiClient,
    intro_message: String,
    messages: Vec<ChatMessage>,
    retrieval_trace: Option<RetrievalTrace>,
    loading: bool,
    retrieving: bool,
    active: Option<ActiveTurn>,
}

impl Conversation {
    pub fn new(client: ApiClient, intro_message: impl Into<String>) -> Self {
        Self {
            client,
            intro_message: intro_message.into(),
            messages: Vec::new(),
            retrieval_trace: None,
            loading: false,
            retrieving: false,
            active: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Trace of the most recent turn (or the greeting).
    pub fn retrieval_trace(&self) -> Option<&RetrievalTrace> {
        self.retrieval_trace.as_ref()
    }

    /// A turn is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A turn is in flight and context retrieval has not reported yet.
    pub fn is_retrieving(&self) -> bool {
        self.retrieving
    }

    /// Ask the backend for a greeting and show it as the first message,
    /// falling back to the configured intro text.
    pub async fn load_greeting(&mut self) -> Opening {
        match self.client.get_greeting().await {
            Ok(greeting) if !greeting.greeting.is_empty() => {
                let mut message =
                    ChatMessage::new(generate_message_id(), Role::Assistant, greeting.greeting);
                message.tool_calls.replace(greeting.tool_calls);
                message.response_time_ms = greeting.response_time_ms;
                self.messages.push(message);
                if greeting.retrieval_trace.is_some() {
                    self.retrieval_trace = greeting.retrieval_trace;
                }
                Opening::Greeting
            }
            Ok(_) => {
                self.push_intro();
                Opening::Intro(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "greeting failed, showing intro message");
                self.push_intro();
                Opening::Intro(Some(e))
            }
        }
    }

    fn push_intro(&mut self) {
        let intro = ChatMessage::new(generate_message_id(), Role::Assistant, self.intro_message.clone());
        self.messages.push(intro);
    }

    /// Append the user's message and start the turn that answers it.
    ///
    /// Pass every event from the returned stream to [`apply`](Self::apply).
    pub fn send(&mut self, text: &str) -> TurnStream {
        if let Some(previous) = self.active.take() {
            tracing::debug!("send while a turn was in flight, cancelling it");
            previous.cancel.cancel();
        }

        self.messages
            .push(ChatMessage::new(generate_message_id(), Role::User, text));
        self.loading = true;
        self.retrieving = true;
        self.retrieval_trace = None;

        let stream = self.client.send_message_stream(text);
        self.active = Some(ActiveTurn {
            assistant_id: generate_message_id(),
            cancel: stream.cancel_handle(),
        });
        stream
    }

    /// Fold one event of the current turn into the conversation.
    pub fn apply(&mut self, event: &TurnEvent) {
        if self.active.is_none() {
            tracing::debug!("event after the turn ended, ignoring");
            return;
        }

        match event {
            TurnEvent::RetrievalTrace(trace) => {
                self.retrieval_trace = Some(trace.clone());
                self.retrieving = false;
            }
            TurnEvent::ToolCalls(calls) => {
                if let Some(message) = self.assistant_message() {
                    message.tool_calls.replace(calls.clone());
                }
            }
            TurnEvent::ToolStart(start) => {
                if let Some(message) = self.assistant_message() {
                    message.tool_calls.start(start);
                }
            }
            TurnEvent::ToolComplete(complete) => {
                if let Some(message) = self.assistant_message() {
                    message.tool_calls.complete(complete);
                }
            }
            TurnEvent::Content(delta) => {
                if let Some(message) = self.assistant_message() {
                    message.content.push_str(delta);
                }
            }
            TurnEvent::Done(summary) => {
                let response_time_ms = summary.response_time_ms;
                if let Some(message) = self.existing_assistant_message() {
                    message.response_time_ms = response_time_ms;
                }
                self.finish_turn();
            }
            TurnEvent::Error(error) => {
                self.finish_turn();
                // The backend drops a session whose turn failed.
                self.client.store().clear_session_id();
                let mut message = ChatMessage::new(
                    generate_message_id(),
                    Role::Assistant,
                    format!(
                        "Sorry, there was an error: {error}. The session has been reset - please try again."
                    ),
                );
                message.is_error = true;
                self.messages.push(message);
            }
        }
    }

    fn finish_turn(&mut self) {
        self.loading = false;
        self.retrieving = false;
        self.active = None;
    }

    /// The assistant message of the active turn, created on first use.
    fn assistant_message(&mut self) -> Option<&mut ChatMessage> {
        let id = self.active.as_ref()?.assistant_id.clone();
        match self.messages.iter().position(|m| m.id == id) {
            Some(idx) => Some(&mut self.messages[idx]),
            None => {
                self.messages
                    .push(ChatMessage::new(id, Role::Assistant, String::new()));
                self.messages.last_mut()
            }
        }
    }

    fn existing_assistant_message(&mut self) -> Option<&mut ChatMessage> {
        let id = self.active.as_ref()?.assistant_id.clone();
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Abort the turn in flight, if any. Silent: no error message is added.
    pub fn cancel(&mut self) {
        if let Some(turn) = self.active.take() {
            turn.cancel.cancel();
        }
        self.loading = false;
        self.retrieving = false;
    }

    /// End the backend session (awaited) and start over with a new greeting.
    pub async fn reset(&mut self) -> Opening {
        self.cancel();
        self.end_backend_session().await;

        self.messages.clear();
        self.retrieval_trace = None;
        self.client.store().clear_session_id();

        self.load_greeting().await
    }

    /// End the backend session (awaited) and forget both credentials.
    pub async fn exit(&mut self) {
        self.cancel();
        self.end_backend_session().await;

        self.client.store().clear_session_id();
        self.client.store().clear_access_code();
    }

    /// Unload path: queue the end-session beacon without waiting.
    pub fn teardown(&mut self) -> bool {
        self.cancel();
        match self.client.store().session_id() {
            Some(session_id) => self.client.end_session_beacon(&session_id),
            None => false,
        }
    }

    async fn end_backend_session(&self) {
        let Some(session_id) = self.client.store().session_id() else {
            return;
        };
        match self.client.end_session(&session_id, true).await {
            Ok(outcome) if outcome.success => {
                tracing::info!(
                    episodes_created = ?outcome.episodes_created,
                    "session ended"
                );
            }
            Ok(outcome) => {
                tracing::warn!(error = ?outcome.error, "backend declined to end session");
            }
            Err(e) => tracing::warn!(error = %e, "failed to end session"),
        }
    }
}
