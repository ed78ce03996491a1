//! Credential and session-id persistence.
//!
//! The client never reads ambient state: it holds an `Arc<dyn CredentialStore>`
//! that owns exactly two strings, the access code and the current session id.
//! Writes are last-write-wins; there is no other coordination.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Holder for the access code and the session id.
pub trait CredentialStore: Send + Sync {
    fn access_code(&self) -> Option<String>;
    fn set_access_code(&self, code: &str);
    fn clear_access_code(&self);

    fn session_id(&self) -> Option<String>;
    fn set_session_id(&self, session_id: &str);
    fn clear_session_id(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Process-lifetime store, the equivalent of browser tab storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoredState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_access_code(code: &str) -> Self {
        let store = Self::new();
        store.set_access_code(code);
        store
    }

    pub fn snapshot(&self) -> StoredState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update(&self, f: impl FnOnce(&mut StoredState)) -> StoredState {
        // Poisoning cannot leave a half-written Option<String> behind.
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
        guard.clone()
    }
}

impl CredentialStore for MemoryStore {
    fn access_code(&self) -> Option<String> {
        self.snapshot().access_code
    }

    fn set_access_code(&self, code: &str) {
        self.update(|s| s.access_code = Some(code.to_string()));
    }

    fn clear_access_code(&self) {
        self.update(|s| s.access_code = None);
    }

    fn session_id(&self) -> Option<String> {
        self.snapshot().session_id
    }

    fn set_session_id(&self, session_id: &str) {
        self.update(|s| s.session_id = Some(session_id.to_string()));
    }

    fn clear_session_id(&self) {
        self.update(|s| s.session_id = None);
    }
}

/// Store mirrored to a TOML file so separate CLI invocations share one login.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the state file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = read_state(&path)?;
        Ok(Self {
            path,
            inner: MemoryStore {
                state: RwLock::new(state),
            },
        })
    }

    /// Re-read the file. Writes are best effort (a failed write is logged and
    /// the in-memory value still changes), so callers that need the change to
    /// outlive the process compare this against the live state.
    pub fn on_disk(&self) -> Result<StoredState> {
        read_state(&self.path)
    }

    /// The in-memory state, which is what this process acts on.
    pub fn snapshot(&self) -> StoredState {
        self.inner.snapshot()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &StoredState) {
        if let Err(e) = write_state(&self.path, state) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist client state");
        }
    }
}

fn read_state(path: &Path) -> Result<StoredState> {
    if !path.exists() {
        return Ok(StoredState::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse state file {}", path.display()))
}

fn write_state(path: &Path, state: &StoredState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let contents = toml::to_string(state).context("failed to serialize state")?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents).context("failed to write temp state file")?;
    std::fs::rename(&tmp_path, path).context("failed to rename temp state file")?;
    Ok(())
}

impl CredentialStore for FileStore {
    fn access_code(&self) -> Option<String> {
        self.inner.access_code()
    }

    fn set_access_code(&self, code: &str) {
        let state = self.inner.update(|s| s.access_code = Some(code.to_string()));
        self.persist(&state);
    }

    fn clear_access_code(&self) {
        let state = self.inner.update(|s| s.access_code = None);
        self.persist(&state);
    }

    fn session_id(&self) -> Option<String> {
        self.inner.session_id()
    }

    fn set_session_id(&self, session_id: &str) {
        let state = self.inner.update(|s| s.session_id = Some(session_id.to_string()));
        self.persist(&state);
    }

    fn clear_session_id(&self) {
        let state = self.inner.update(|s| s.session_id = None);
        self.persist(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_fields_clear_independently() {
        let store = MemoryStore::with_access_code("DEMO-AAAA-1111");
        store.set_session_id("s1");

        store.clear_session_id();
        assert_eq!(store.access_code().as_deref(), Some("DEMO-AAAA-1111"));
        assert_eq!(store.session_id(), None);

        store.set_session_id("s2");
        store.clear_access_code();
        assert_eq!(store.access_code(), None);
        assert_eq!(store.session_id().as_deref(), Some("s2"));
    }

    #[test]
    fn last_write_wins() {
        let store = MemoryStore::new();
        store.set_session_id("s1");
        store.set_session_id("s2");
        assert_eq!(store.session_id().as_deref(), Some("s2"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("state.toml");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.access_code(), None);
        store.set_access_code("DEMO-AAAA-1111");
        store.set_session_id("s1");
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.access_code().as_deref(), Some("DEMO-AAAA-1111"));
        assert_eq!(reopened.session_id().as_deref(), Some("s1"));

        reopened.clear_access_code();
        let again = FileStore::open(&path).unwrap();
        assert_eq!(again.access_code(), None);
        assert_eq!(again.session_id().as_deref(), Some("s1"));
    }

    #[test]
    fn on_disk_matches_after_successful_writes() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("state.toml")).unwrap();
        store.set_access_code("DEMO-AAAA-1111");
        store.clear_access_code();
        store.set_session_id("s1");
        assert_eq!(store.on_disk().unwrap(), store.snapshot());
    }

    #[test]
    fn failed_write_is_visible_through_on_disk() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the state directory should be.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = FileStore::open(blocker.join("state.toml")).unwrap();

        store.set_access_code("DEMO-AAAA-1111");

        assert_eq!(store.access_code().as_deref(), Some("DEMO-AAAA-1111"));
        assert_ne!(store.on_disk().unwrap(), store.snapshot());
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.toml");
        std::fs::write(&path, "access_code = [").unwrap();
        assert!(FileStore::open(&path).is_err());
    }
}
