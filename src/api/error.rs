use thiserror::Error;

/// Everything a client operation can fail with.
///
/// `Display` is the message meant for the person at the keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No access code stored; no request was made.
    #[error("No access code. Please enter your code.")]
    MissingAccessCode,

    /// No session id to act on; no request was made.
    #[error("Missing access code or session ID")]
    MissingSessionId,

    /// 401/403. The stored access code has been purged.
    #[error("Access code expired or invalid. Please re-enter.")]
    Unauthorized,

    /// 429.
    #[error("{0}")]
    RateLimited(String),

    /// Any other non-2xx; `message` is the server's `detail` when present.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The request never got a response.
    #[error("{0}")]
    Network(String),

    /// The event stream broke off before the turn finished.
    #[error("Connection lost. Please try again.")]
    ConnectionLost,

    /// The backend reported an `error` event mid-turn.
    #[error("{0}")]
    Stream(String),

    /// A 2xx response whose body could not be decoded.
    #[error("unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the stored access code is no longer usable.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingAccessCode)
    }

    pub(crate) fn network() -> Self {
        Self::Network("Network error. Please try again.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_user_facing() {
        assert_eq!(
            ApiError::Unauthorized.to_string(),
            "Access code expired or invalid. Please re-enter."
        );
        assert_eq!(
            ApiError::Server {
                status: 500,
                message: "Orchestrator unavailable".into()
            }
            .to_string(),
            "Orchestrator unavailable"
        );
        assert_eq!(ApiError::ConnectionLost.to_string(), "Connection lost. Please try again.");
    }

    #[test]
    fn auth_errors_are_flagged() {
        assert!(ApiError::Unauthorized.is_auth());
        assert!(ApiError::MissingAccessCode.is_auth());
        assert!(!ApiError::RateLimited("slow down".into()).is_auth());
    }
}
