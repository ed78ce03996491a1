//! Fire-and-forget delivery for the teardown path.
//!
//! A browser queues `navigator.sendBeacon` payloads independently of the page,
//! so they survive navigation. Outside a browser the closest equivalent is to
//! hand the request to a background task and give the process a short, bounded
//! window to let it finish before exiting: [`HttpBeacon`] does exactly that.
//!
//! Beacon requests carry no custom headers; anything the server needs to
//! authenticate goes in the body.

use std::time::Duration;

use tokio_util::task::TaskTracker;

/// Best-effort, fire-and-forget POST of a JSON body.
pub trait Beacon: Send + Sync {
    /// Queue `body` for delivery to `url`. Returns `false` if it could not be
    /// queued at all; delivery itself is never confirmed.
    fn send(&self, url: &str, body: String) -> bool;
}

/// Beacon backed by detached tokio tasks with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpBeacon {
    http: reqwest::Client,
    tracker: TaskTracker,
}

impl HttpBeacon {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "beacon client config rejected, using defaults");
                reqwest::Client::new()
            });
        Self {
            http,
            tracker: TaskTracker::new(),
        }
    }

    /// Number of deliveries still in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait up to `limit` for queued deliveries. Returns `true` if all finished.
    pub async fn flush(&self, limit: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(limit, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        if !drained {
            tracing::warn!(pending = self.tracker.len(), "beacon deliveries still pending at shutdown");
        }
        drained
    }
}

impl Beacon for HttpBeacon {
    fn send(&self, url: &str, body: String) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url, "no async runtime available, beacon dropped");
            return false;
        };

        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let url = url.to_string();

        self.tracker.spawn_on(
            async move {
                match request.send().await {
                    Ok(resp) => tracing::debug!(%url, status = %resp.status(), "beacon delivered"),
                    Err(e) => tracing::debug!(%url, error = %e, "beacon delivery failed"),
                }
            },
            &handle,
        );
        true
    }
}
