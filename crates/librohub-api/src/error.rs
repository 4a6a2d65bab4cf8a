use thiserror::Error;

/// Top-level error type for the `librohub-api` crate.
///
/// Covers every failure mode across both API surfaces: REST (PostgREST)
/// and the realtime websocket. `librohub-core` classifies these into
/// read/write failures at the operation boundary.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service rejected the API key (HTTP 401).
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Row-level security or role denied the request (HTTP 403).
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST ────────────────────────────────────────────────────────
    /// Structured error from the REST endpoint.
    #[error("REST API error (HTTP {status}): {message}")]
    Rest {
        message: String,
        /// PostgREST / Postgres error code, e.g. `"23503"` or `"PGRST116"`.
        code: Option<String>,
        details: Option<String>,
        status: u16,
    },

    // ── Realtime ────────────────────────────────────────────────────
    /// Websocket connection failed.
    #[error("Realtime connection failed: {0}")]
    RealtimeConnect(String),

    /// The server refused to join a channel.
    #[error("Realtime channel '{topic}' join rejected: {reason}")]
    ChannelJoin { topic: String, reason: String },

    /// The server reported a crash on a joined channel.
    #[error("Realtime channel '{topic}' errored on the server")]
    ChannelError { topic: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RealtimeConnect(_) | Self::ChannelError { .. } => true,
            Self::Rest { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Rest { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Extract the service error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Rest { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Rest {
            message: "boom".into(),
            code: None,
            details: None,
            status: 503,
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn constraint_violation_exposes_code() {
        let err = Error::Rest {
            message: "violates foreign key constraint".into(),
            code: Some("23503".into()),
            details: None,
            status: 409,
        };
        assert!(!err.is_transient());
        assert_eq!(err.api_error_code(), Some("23503"));
    }
}
