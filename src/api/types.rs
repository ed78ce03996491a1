//! Wire types for the HrdAI backend.
//!
//! Response bodies are deserialized leniently: every optional field has a
//! default so older and newer backend builds both decode.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Read an explicit `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A backend tool invocation reported for display.
///
/// `success` is `None` while the call is still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    pub fn is_pending(&self) -> bool {
        self.success.is_none()
    }
}

/// Payload of a `tool_start` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolStart {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// Payload of a `tool_complete` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolComplete {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Absent on some backend builds; see [`succeeded`](Self::succeeded).
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolComplete {
    /// Explicit `success`, otherwise success unless an error was reported.
    pub fn succeeded(&self) -> bool {
        self.success.unwrap_or(self.error.is_none())
    }
}

/// What context retrieval produced for a turn.
///
/// Read-only and loosely typed: any list or name may arrive as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalTrace {
    /// Entities, topics and emotions detected in the message.
    pub signals: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub strategies_used: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub entities_retrieved: Vec<RetrievedEntity>,
    #[serde(deserialize_with = "null_as_default")]
    pub topics_retrieved: Vec<RetrievedTopic>,
    #[serde(deserialize_with = "null_as_default")]
    pub episodes_retrieved: Vec<RetrievedEpisode>,
    pub timing_ms: Option<f64>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RetrievalTrace {
    /// Entities, topics and episodes combined.
    pub fn total_items(&self) -> usize {
        self.entities_retrieved.len() + self.topics_retrieved.len() + self.episodes_retrieved.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievedEntity {
    pub id: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub entity_type: Option<String>,
    pub relationship_to_self: Option<String>,
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievedTopic {
    pub id: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub status: Option<String>,
    pub context: Option<String>,
    pub last_mentioned: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievedEpisode {
    pub id: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    pub created_at: Option<String>,
}

/// Result of `get_greeting`.
#[derive(Debug, Clone, PartialEq)]
pub struct Greeting {
    pub greeting: String,
    pub session_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub retrieval_trace: Option<RetrievalTrace>,
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GreetingResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub greeting: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub retrieval_trace: Option<RetrievalTrace>,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
}

impl From<GreetingResponse> for Greeting {
    fn from(r: GreetingResponse) -> Self {
        Self {
            greeting: r.greeting,
            session_id: r.session_id,
            tool_calls: r.tool_calls.unwrap_or_default(),
            retrieval_trace: r.retrieval_trace,
            response_time_ms: r.response_time_ms,
        }
    }
}

/// Result of the non-streaming `send_message`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub session_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub retrieval_trace: Option<RetrievalTrace>,
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatReplyResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub retrieval_trace: Option<RetrievalTrace>,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
}

impl From<ChatReplyResponse> for ChatReply {
    fn from(r: ChatReplyResponse) -> Self {
        Self {
            response: r.response,
            session_id: r.session_id,
            tool_calls: r.tool_calls.unwrap_or_default(),
            retrieval_trace: r.retrieval_trace,
            response_time_ms: r.response_time_ms,
        }
    }
}

/// Payload of the `done` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TurnSummary {
    pub session_id: Option<String>,
    pub response_time_ms: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `/auth/validate`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeValidation {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Result of `/auth/use`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeActivation {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub sessions_remaining: Option<i64>,
}

/// Result of `/chat/end`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndSessionOutcome {
    pub success: bool,
    pub episodes_created: Option<i64>,
    pub topics_created: Option<i64>,
    pub topics_updated: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StreamRequest<'a> {
    pub message: &'a str,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndSessionRequest<'a> {
    pub session_id: &'a str,
    pub persist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CodeRequest<'a> {
    pub code: &'a str,
}
