//! Typed events of one chat turn.

use serde::Deserialize;

use super::error::ApiError;
use super::types::{RetrievalTrace, ToolCall, ToolComplete, ToolStart, TurnSummary};
use crate::sse::SseFrame;

/// Everything a turn can report, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Context retrieval finished for this turn.
    RetrievalTrace(RetrievalTrace),
    /// Legacy batch form: the complete list of tool calls.
    ToolCalls(Vec<ToolCall>),
    ToolStart(ToolStart),
    ToolComplete(ToolComplete),
    /// A text delta for the assistant message.
    Content(String),
    /// End of turn. Any new session id has already been stored.
    Done(TurnSummary),
    /// Abnormal end of turn. Never produced by cancellation.
    Error(ApiError),
}

impl TurnEvent {
    /// `Done` and `Error` end the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }
}

#[derive(Deserialize)]
struct ToolCallsPayload {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ContentPayload {
    #[serde(default)]
    delta: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
}

/// Decode one frame.
///
/// `Ok(None)` means the event type is not one this client handles. A payload
/// that fails to parse is an `Err`; callers skip it and keep reading.
pub fn decode_frame(frame: &SseFrame) -> Result<Option<TurnEvent>, serde_json::Error> {
    let data = frame.data.as_str();
    let event = match frame.event.as_str() {
        "retrieval_trace" => TurnEvent::RetrievalTrace(serde_json::from_str(data)?),
        "tool_calls" => {
            let payload: ToolCallsPayload = serde_json::from_str(data)?;
            TurnEvent::ToolCalls(payload.tool_calls.unwrap_or_default())
        }
        "tool_start" => TurnEvent::ToolStart(serde_json::from_str(data)?),
        "tool_complete" => TurnEvent::ToolComplete(serde_json::from_str(data)?),
        "content" => {
            let payload: ContentPayload = serde_json::from_str(data)?;
            TurnEvent::Content(payload.delta.unwrap_or_default())
        }
        "done" => TurnEvent::Done(serde_json::from_str(data)?),
        "error" => {
            let payload: ErrorPayload = serde_json::from_str(data)?;
            TurnEvent::Error(ApiError::Stream(
                payload.error.unwrap_or_else(|| "Stream error".into()),
            ))
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: event.into(),
            data: data.into(),
        }
    }

    #[test]
    fn decodes_content_and_done() {
        let content = decode_frame(&frame("content", r#"{"delta":"Hi"}"#)).unwrap();
        assert_eq!(content, Some(TurnEvent::Content("Hi".into())));

        let done = decode_frame(&frame("done", r#"{"session_id":"s2","response_time_ms":120}"#))
            .unwrap()
            .unwrap();
        match done {
            TurnEvent::Done(summary) => {
                assert_eq!(summary.session_id.as_deref(), Some("s2"));
                assert_eq!(summary.response_time_ms, Some(120.0));
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn error_event_without_message_gets_fallback() {
        let event = decode_frame(&frame("error", "{}")).unwrap().unwrap();
        assert_eq!(event, TurnEvent::Error(ApiError::Stream("Stream error".into())));
        assert!(event.is_terminal());
    }

    #[test]
    fn tool_events_decode() {
        let start = decode_frame(&frame(
            "tool_start",
            r#"{"id":"t1","name":"memory_store","input":{"content":"Jack lives in Boston"}}"#,
        ))
        .unwrap()
        .unwrap();
        assert!(matches!(start, TurnEvent::ToolStart(ref s) if s.name == "memory_store"));

        let complete = decode_frame(&frame(
            "tool_complete",
            r#"{"name":"memory_store","success":false,"duration_ms":8.5,"error":"timeout"}"#,
        ))
        .unwrap()
        .unwrap();
        match complete {
            TurnEvent::ToolComplete(c) => {
                assert_eq!(c.success, Some(false));
                assert!(!c.succeeded());
                assert_eq!(c.error.as_deref(), Some("timeout"));
            }
            other => panic!("expected tool_complete, got {other:?}"),
        }

        let batch = decode_frame(&frame("tool_calls", r#"{"tool_calls":null}"#)).unwrap();
        assert_eq!(batch, Some(TurnEvent::ToolCalls(Vec::new())));
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        assert_eq!(decode_frame(&frame("message", r#"{"x":1}"#)).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(decode_frame(&frame("content", "{\"delta\":")).is_err());
    }
}
