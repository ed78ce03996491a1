//! Tool-call bookkeeping for an assistant message.

use serde::Serialize;

use crate::api::types::{ToolCall, ToolComplete, ToolStart};

/// Tool calls reported during one turn, in the order they started.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolCallLog {
    calls: Vec<ToolCall>,
}

impl ToolCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ToolCall> {
        self.calls.iter().filter(|c| c.is_pending())
    }

    /// Legacy `tool_calls` event: the batch replaces whatever was tracked.
    pub fn replace(&mut self, calls: Vec<ToolCall>) {
        self.calls = calls;
    }

    /// Record a started invocation as pending.
    pub fn start(&mut self, start: &ToolStart) -> &ToolCall {
        let id = start
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("tool_{}", uuid::Uuid::now_v7().simple()));
        self.calls.push(ToolCall {
            id,
            name: start.name.clone(),
            input: start.input.clone(),
            success: None,
            duration_ms: None,
            error: None,
        });
        &self.calls[self.calls.len() - 1]
    }

    /// Resolve the most recent pending invocation with the same tool name.
    ///
    /// A completion with nothing pending under that name is kept as an
    /// already-resolved entry.
    pub fn complete(&mut self, complete: &ToolComplete) -> &ToolCall {
        let idx = match self
            .calls
            .iter()
            .rposition(|c| c.is_pending() && c.name == complete.name)
        {
            Some(idx) => idx,
            None => {
                tracing::debug!(tool = %complete.name, "tool completion without a pending start");
                self.calls.push(ToolCall {
                    id: complete.id.clone().unwrap_or_default(),
                    name: complete.name.clone(),
                    input: serde_json::Value::Null,
                    success: None,
                    duration_ms: None,
                    error: None,
                });
                self.calls.len() - 1
            }
        };

        let call = &mut self.calls[idx];
        call.success = Some(complete.succeeded());
        call.duration_ms = complete.duration_ms;
        call.error = complete.error.clone();
        call
    }
}

/// Display category of a tool, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Writes to memory: store / create / add / update.
    Store,
    /// Reads from memory: search / get / list / find.
    Search,
    Todo,
    /// The user's own profile.
    SelfProfile,
    Other,
}

impl ToolKind {
    pub fn classify(name: &str) -> Self {
        let name = name.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        if has(&["store", "create", "add", "update"]) {
            Self::Store
        } else if has(&["search", "get", "list", "find"]) {
            Self::Search
        } else if has(&["todo"]) {
            Self::Todo
        } else if has(&["self"]) {
            Self::SelfProfile
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Store => "Storing",
            Self::Search => "Searching",
            Self::Todo => "Task",
            Self::SelfProfile => "Profile",
            Self::Other => "Tool",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `memory_store_fact` -> `Store Fact`
pub fn display_name(name: &str) -> String {
    let mut trimmed = name.to_string();
    for prefix in ["memory_", "self_", "todo_"] {
        if let Some(pos) = trimmed.find(prefix) {
            trimmed.replace_range(pos..pos + prefix.len(), "");
        }
    }

    trimmed
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
