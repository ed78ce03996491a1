//! HTTP client for the HrdAI backend.
//!
//! [`ApiClient`] owns the connection pool, the base URL, the credential store
//! and the teardown beacon. Request/response operations return
//! `Result<_, ApiError>`; the streaming turn lives in [`stream`].
//!
//! Status handling is shared by every call that sends the stored access code:
//! 401/403 purge the code, 429 is reported as rate limiting, anything else
//! surfaces the server's `detail` field or a per-call fallback message.

pub mod error;
pub mod events;
pub mod stream;
pub mod types;

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::beacon::Beacon;
use crate::store::CredentialStore;
use error::ApiError;
use types::{
    ChatReply, ChatReplyResponse, CodeActivation, CodeRequest, CodeValidation, EndSessionOutcome,
    EndSessionRequest, Greeting, GreetingResponse, HealthStatus, StreamRequest,
};

/// Header carrying the access code on authenticated requests.
pub const ACCESS_CODE_HEADER: &str = "X-Access-Code";

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Whether a request was made with the stored access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential {
    Stored,
    None,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    beacon: Arc<dyn Beacon>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        beacon: Arc<dyn Beacon>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            store,
            beacon,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential store this client reads and purges.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn require_access_code(&self) -> Result<String, ApiError> {
        self.store.access_code().ok_or(ApiError::MissingAccessCode)
    }

    /// Map a non-2xx response to an error, purging the stored code on 401/403.
    async fn failure(&self, response: Response, fallback: &str, credential: Credential) -> ApiError {
        let status = response.status();

        if credential == Credential::Stored
            && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        {
            tracing::warn!(status = %status, "access code rejected, clearing stored code");
            self.store.clear_access_code();
            return ApiError::Unauthorized;
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .map(|detail| match detail {
                Value::String(s) => s,
                other => other.to_string(),
            });

        if status == StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited(
                detail.unwrap_or_else(|| "Rate limit exceeded. Please wait.".into()),
            );
        }

        ApiError::Server {
            status: status.as_u16(),
            message: detail.unwrap_or_else(|| fallback.to_string()),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// `GET /health` liveness probe.
    pub async fn check_health(&self) -> Result<HealthStatus, ApiError> {
        let response = self.http.get(self.url("/health")).send().await.map_err(|e| {
            tracing::debug!(error = %e, "health check failed");
            ApiError::Network("Cannot connect to API".into())
        })?;

        if !response.status().is_success() {
            return Err(ApiError::Server {
                status: response.status().as_u16(),
                message: "API unavailable".into(),
            });
        }
        Self::decode(response).await
    }

    /// Non-committal check of an access code. Does not touch the store.
    pub async fn validate_access_code(&self, code: &str) -> Result<CodeValidation, ApiError> {
        let response = self
            .http
            .post(self.url("/auth/validate"))
            .json(&CodeRequest { code })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "access code validation failed");
                ApiError::network()
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Invalid access code", Credential::None).await);
        }
        Self::decode(response).await
    }

    /// Activate (consume) an access code. Does not touch the store.
    pub async fn use_access_code(&self, code: &str) -> Result<CodeActivation, ApiError> {
        let response = self
            .http
            .post(self.url("/auth/use"))
            .json(&CodeRequest { code })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "access code activation failed");
                ApiError::network()
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Failed to activate code", Credential::None).await);
        }
        Self::decode(response).await
    }

    /// Ask the backend to open a session and greet the user.
    ///
    /// Stores the returned session id for the turns that follow.
    pub async fn get_greeting(&self) -> Result<Greeting, ApiError> {
        let access_code = self.require_access_code()?;

        let response = self
            .http
            .post(self.url("/chat/greeting"))
            .header(ACCESS_CODE_HEADER, &access_code)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "greeting request failed");
                ApiError::network()
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Failed to get greeting", Credential::Stored).await);
        }

        let greeting: Greeting = Self::decode::<GreetingResponse>(response).await?.into();
        if let Some(session_id) = greeting.session_id.as_deref().filter(|s| !s.is_empty()) {
            self.store.set_session_id(session_id);
        }
        tracing::info!(session_id = ?greeting.session_id, "greeting received");
        Ok(greeting)
    }

    /// Send one message and wait for the whole reply (no streaming).
    pub async fn send_message(&self, message: &str) -> Result<ChatReply, ApiError> {
        let access_code = self.require_access_code()?;

        let response = self
            .http
            .post(self.url("/chat"))
            .header(ACCESS_CODE_HEADER, &access_code)
            .json(&StreamRequest {
                message,
                session_id: self.store.session_id(),
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                ApiError::network()
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Chat request failed", Credential::Stored).await);
        }

        let reply: ChatReply = Self::decode::<ChatReplyResponse>(response).await?.into();
        if let Some(session_id) = reply.session_id.as_deref().filter(|s| !s.is_empty()) {
            self.store.set_session_id(session_id);
        }
        Ok(reply)
    }

    /// `GET /context`, optionally with the message to compute context for.
    pub async fn get_context(&self, message: Option<&str>) -> Result<Value, ApiError> {
        let access_code = self.require_access_code()?;

        let url = self.url("/context");
        let url = match message.filter(|m| !m.is_empty()) {
            Some(m) => reqwest::Url::parse_with_params(&url, &[("message", m)]),
            None => reqwest::Url::parse(&url),
        }
        .map_err(|e| ApiError::Network(format!("invalid API URL {url}: {e}")))?;

        let response = self
            .http
            .get(url)
            .header(ACCESS_CODE_HEADER, &access_code)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "context request failed");
                ApiError::Network("Network error".into())
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Context request failed", Credential::Stored).await);
        }
        Self::decode(response).await
    }

    /// End a session so the backend persists it. Await this before
    /// discarding local state.
    pub async fn end_session(
        &self,
        session_id: &str,
        persist: bool,
    ) -> Result<EndSessionOutcome, ApiError> {
        let access_code = self.require_access_code()?;
        if session_id.is_empty() {
            return Err(ApiError::MissingSessionId);
        }

        let response = self
            .http
            .post(self.url("/chat/end"))
            .header(ACCESS_CODE_HEADER, &access_code)
            .json(&EndSessionRequest {
                session_id,
                persist,
                access_code: None,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "end session request failed");
                ApiError::Network("Network error".into())
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "Failed to end session", Credential::Stored).await);
        }

        let outcome: EndSessionOutcome = Self::decode(response).await?;
        tracing::info!(
            session_id,
            success = outcome.success,
            episodes_created = ?outcome.episodes_created,
            "session ended"
        );
        Ok(outcome)
    }

    /// Teardown variant of [`end_session`](Self::end_session): queued on the
    /// beacon and never awaited. The access code travels in the body because
    /// beacon requests carry no custom headers.
    ///
    /// Returns `false` without sending anything when credentials are missing
    /// or the beacon refused the payload.
    pub fn end_session_beacon(&self, session_id: &str) -> bool {
        let Some(access_code) = self.store.access_code() else {
            return false;
        };
        if session_id.is_empty() {
            return false;
        }

        let body = match serde_json::to_string(&EndSessionRequest {
            session_id,
            persist: true,
            access_code: Some(&access_code),
        }) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode end-session beacon");
                return false;
            }
        };

        let queued = self.beacon.send(&self.url("/chat/end"), body);
        tracing::debug!(session_id, queued, "end-session beacon");
        queued
    }
}
