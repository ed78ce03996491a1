pub mod chat;
pub mod context;
pub mod health;
pub mod login;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use hrdai::beacon::HttpBeacon;
use hrdai::config::HrdaiConfig;
use hrdai::store::FileStore;
use hrdai::ApiClient;

/// Client wiring shared by every subcommand.
pub struct ClientContext {
    pub client: ApiClient,
    pub store: Arc<FileStore>,
    pub beacon: Arc<HttpBeacon>,
    pub beacon_timeout: Duration,
}

/// Open the state file and build a client against the configured API.
pub fn connect(config: &HrdaiConfig) -> Result<ClientContext> {
    let state_path = config.resolved_state_path();
    let store = Arc::new(FileStore::open(&state_path)?);
    tracing::debug!(state = %state_path.display(), api = %config.api.base_url, "client ready");

    let beacon_timeout = Duration::from_millis(config.api.beacon_timeout_ms);
    let beacon = Arc::new(HttpBeacon::new(beacon_timeout));
    let client = ApiClient::new(config.api.base_url.clone(), store.clone(), beacon.clone());

    Ok(ClientContext {
        client,
        store,
        beacon,
        beacon_timeout,
    })
}

impl ClientContext {
    /// Fail if the state file no longer matches what this process holds, so a
    /// purged or cleared credential is not silently reloaded next run.
    pub fn confirm_saved(&self) -> Result<()> {
        let on_disk = self.store.on_disk()?;
        if on_disk != self.store.snapshot() {
            bail!(
                "Could not save login state to {}. Check the file's permissions or delete it.",
                self.store.path().display()
            );
        }
        Ok(())
    }
}

/// Spinner on stderr while waiting on the backend.
fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrdai::store::CredentialStore;
    use tempfile::TempDir;

    fn config_at(path: &std::path::Path) -> HrdaiConfig {
        let mut config = HrdaiConfig::default();
        config.storage.state_path = path.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn confirm_saved_accepts_written_state() {
        let tmp = TempDir::new().unwrap();
        let ctx = connect(&config_at(&tmp.path().join("state.toml"))).unwrap();
        ctx.client.store().set_access_code("DEMO-AAAA-1111");
        ctx.client.store().clear_access_code();
        assert!(ctx.confirm_saved().is_ok());
    }

    #[test]
    fn confirm_saved_reports_unwritable_state() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let ctx = connect(&config_at(&blocker.join("state.toml"))).unwrap();

        ctx.client.store().set_access_code("DEMO-AAAA-1111");

        let err = ctx.confirm_saved().unwrap_err();
        assert!(err.to_string().contains("Could not save login state"));
    }
}
