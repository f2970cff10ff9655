//! Authenticated session state
//!
//! A [`Session`] is the live token set authorizing transport calls. The
//! [`SessionManager`] is its single writer; everyone else reads clones.

mod manager;

pub use manager::SessionManager;

use chrono::{DateTime, Duration, Utc};

use crate::transport::SessionPayload;

/// The current authenticated context for one account
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token attached to every authenticated call
    pub token: String,

    /// Refresh token, when the platform issued one
    pub refresh_token: Option<String>,

    /// Instant after which the token must not be used
    pub expires_at: Option<DateTime<Utc>>,

    /// When this session was established
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from the material a login or refresh call returned.
    pub fn from_payload(payload: SessionPayload) -> Self {
        let issued_at = Utc::now();
        let expires_at = payload
            .expires_in_secs
            .map(|secs| issued_at + Duration::seconds(secs as i64));
        Self {
            token: payload.token,
            refresh_token: payload.refresh_token,
            expires_at,
            issued_at,
        }
    }

    /// Whether the validity window has closed. Sessions without a known
    /// expiry are assumed live until the platform rejects them.
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(expires_in_secs: Option<u64>) -> SessionPayload {
        SessionPayload {
            token: "tok-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_in_secs,
        }
    }

    #[test]
    fn test_from_payload() {
        let session = Session::from_payload(payload(Some(3600)));
        assert_eq!(session.token, "tok-1");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert!(session.expires_at.is_some());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_unknown_expiry_is_not_expired() {
        let session = Session::from_payload(payload(None));
        assert!(session.expires_at.is_none());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let session = Session::from_payload(payload(Some(0)));
        assert!(session.is_expired());
    }
}
