//! Streaming session client for the HrdAI personal memory assistant.
//!
//! The memory engine (extraction, entity/topic graph, retrieval strategies,
//! session persistence) runs in the HrdAI backend. This crate is the client
//! side of its HTTP/SSE contract:
//!
//! | Call | Endpoint | Needs access code |
//! |------|----------|-------------------|
//! | [`ApiClient::validate_access_code`](api::ApiClient::validate_access_code) | `POST /auth/validate` | no |
//! | [`ApiClient::use_access_code`](api::ApiClient::use_access_code) | `POST /auth/use` | no |
//! | [`ApiClient::get_greeting`](api::ApiClient::get_greeting) | `POST /chat/greeting` | yes |
//! | [`ApiClient::send_message_stream`](api::ApiClient::send_message_stream) | `POST /chat/stream` (SSE) | yes |
//! | [`ApiClient::send_message`](api::ApiClient::send_message) | `POST /chat` | yes |
//! | [`ApiClient::end_session`](api::ApiClient::end_session) | `POST /chat/end` | yes |
//! | [`ApiClient::end_session_beacon`](api::ApiClient::end_session_beacon) | `POST /chat/end` (code in body) | yes |
//! | [`ApiClient::check_health`](api::ApiClient::check_health) | `GET /health` | no |
//! | [`ApiClient::get_context`](api::ApiClient::get_context) | `GET /context` | yes |
//!
//! Calls that need the access code fail locally, without touching the
//! network, when none is stored. A 401/403 on any of them purges the stored
//! code.
//!
//! # Modules
//!
//! - [`api`] — HTTP client, error taxonomy, wire types, and the cancelable turn stream
//! - [`sse`] — incremental server-sent-event framing
//! - [`store`] — access code and session id persistence
//! - [`beacon`] — fire-and-forget delivery for the teardown path
//! - [`chat`] — conversation view model built on top of the turn stream
//! - [`config`] — configuration loading from TOML files and environment variables

pub mod api;
pub mod beacon;
pub mod chat;
pub mod config;
pub mod sse;
pub mod store;

pub use api::error::ApiError;
pub use api::events::TurnEvent;
pub use api::ApiClient;
