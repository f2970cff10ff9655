//! Transport boundary
//!
//! The core never talks to the platform directly. Everything goes through
//! the [`Transport`] trait (login, refresh, poll, send); the bundled
//! [`HttpTransport`] is one binding of that trait and test code scripts
//! its own. [`TransportClient`] layers timeout, bounded retry, and
//! re-authentication on top of any implementation.

mod client;
mod http;

pub use client::{RetryPolicy, TransportClient};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::error::Result;
use crate::message::{Ack, OutboundMessage};
use crate::session::Session;

/// Raw inbound event as delivered by the platform stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Stable unique identifier assigned by the platform
    pub id: String,

    /// Top-level discriminator, e.g. `"chat"` or `"botInfo"`
    pub event: String,

    /// Opaque payload; may carry a `subEvent` discriminator
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Session material returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Bearer token authorizing subsequent calls
    pub token: String,

    /// Token accepted by the refresh endpoint, when issued
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Validity window in seconds; `None` means the platform did not say
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
}

/// One batch of polled events plus the resumption cursor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollBatch {
    #[serde(default)]
    pub events: Vec<RawEvent>,

    /// Opaque cursor to pass to the next poll; `None` keeps the current one
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Abstract platform transport
///
/// Implementations map wire failures onto [`crate::error::TransportErrorKind`]:
/// rejected tokens become `SessionExpired`, transient faults `Retryable`,
/// everything else `Terminal`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange credentials for session material.
    async fn login(&self, credentials: &Credentials) -> Result<SessionPayload>;

    /// Exchange a session holding a refresh token for fresh material.
    async fn refresh(&self, session: &Session) -> Result<SessionPayload>;

    /// Fetch the next batch of inbound events.
    async fn poll(&self, session: &Session, cursor: Option<&str>) -> Result<PollBatch>;

    /// Deliver one outbound message to a contact.
    async fn send(
        &self,
        session: &Session,
        contact_id: &str,
        message: &OutboundMessage,
        send_id: &str,
    ) -> Result<Ack>;
}
