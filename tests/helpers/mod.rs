#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use hrdai::api::stream::StreamCallbacks;
use hrdai::api::types::{RetrievalTrace, ToolCall, ToolComplete, ToolStart, TurnSummary};
use hrdai::beacon::Beacon;
use hrdai::store::{CredentialStore, MemoryStore};
use hrdai::{ApiClient, ApiError};
use wiremock::MockServer;

pub const CODE: &str = "DEMO-AAAA-1111";

/// Beacon that records payloads instead of sending them.
#[derive(Default)]
pub struct RecordingBeacon {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBeacon {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Beacon for RecordingBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        self.sent.lock().unwrap().push((url.to_string(), body));
        true
    }
}

pub struct Harness {
    pub client: ApiClient,
    pub store: Arc<MemoryStore>,
    pub beacon: Arc<RecordingBeacon>,
}

/// Client against `server` with the demo access code already stored.
pub fn signed_in(server: &MockServer) -> Harness {
    harness(server, MemoryStore::with_access_code(CODE))
}

/// Client against `server` with nothing stored.
pub fn signed_out(server: &MockServer) -> Harness {
    harness(server, MemoryStore::new())
}

fn harness(server: &MockServer, store: MemoryStore) -> Harness {
    let store = Arc::new(store);
    let beacon = Arc::new(RecordingBeacon::default());
    let client = ApiClient::new(server.uri(), store.clone(), beacon.clone());
    Harness {
        client,
        store,
        beacon,
    }
}

impl Harness {
    pub fn access_code(&self) -> Option<String> {
        self.store.access_code()
    }

    pub fn session_id(&self) -> Option<String> {
        self.store.session_id()
    }
}

/// Render `(event, data)` pairs as an SSE body.
pub fn sse_body(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
        .collect()
}

/// What a callback received, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Trace(usize),
    ToolCalls(usize),
    ToolStart(String),
    ToolComplete(String, bool),
    Content(String),
    Done(Option<f64>),
    Error(ApiError),
}

/// Callbacks that append everything to a shared log.
#[derive(Clone, Default)]
pub struct Recorder {
    pub seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ApiError> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn push(&self, seen: Seen) {
        self.seen.lock().unwrap().push(seen);
    }
}

impl StreamCallbacks for Recorder {
    fn on_retrieval_trace(&mut self, trace: &RetrievalTrace) {
        self.push(Seen::Trace(trace.total_items()));
    }

    fn on_tool_calls(&mut self, calls: &[ToolCall]) {
        self.push(Seen::ToolCalls(calls.len()));
    }

    fn on_tool_start(&mut self, start: &ToolStart) {
        self.push(Seen::ToolStart(start.name.clone()));
    }

    fn on_tool_complete(&mut self, complete: &ToolComplete) {
        self.push(Seen::ToolComplete(complete.name.clone(), complete.succeeded()));
    }

    fn on_content(&mut self, delta: &str) {
        self.push(Seen::Content(delta.to_string()));
    }

    fn on_done(&mut self, summary: &TurnSummary) {
        self.push(Seen::Done(summary.response_time_ms));
    }

    fn on_error(&mut self, error: &ApiError) {
        self.push(Seen::Error(error.clone()));
    }
}

/// Requests the mock server has seen so far.
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|r| r.len())
        .unwrap_or(0)
}
