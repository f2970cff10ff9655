//! Bizbot error types

use thiserror::Error;

/// How a transport failure should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Transient failure (connection refused, 5xx, timeout). Safe to retry.
    Retryable,
    /// Permanent failure (malformed request, rejected payload). Retrying
    /// would fail identically.
    Terminal,
    /// The session token was rejected. Refresh the session and replay once.
    SessionExpired,
}

/// Bizbot error type
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials rejected, or refresh and full re-login both failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// No successful authentication has occurred yet
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Transport-level failure
    #[error("Transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// The poller exhausted its consecutive-failure budget
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a retryable transport error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Retryable,
            message: message.into(),
        }
    }

    /// Shorthand for a terminal transport error.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Terminal,
            message: message.into(),
        }
    }

    /// Shorthand for a session-expired transport error.
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::SessionExpired,
            message: message.into(),
        }
    }

    /// Whether retrying the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => *kind == TransportErrorKind::Retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether the failure indicates an expired or invalidated session.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportErrorKind::SessionExpired,
                ..
            }
        )
    }
}

/// Result type alias for bizbot operations
pub type Result<T> = std::result::Result<T, Error>;
