//! Session lifecycle management
//!
//! One manager per account. Login and refresh go through the abstract
//! transport; the resulting session is held behind a read-write lock with
//! this manager as the single writer. The refresh path is serialized by a
//! mutex so that concurrent callers (the poll loop and handler-initiated
//! sends) coalesce onto a single in-flight attempt instead of issuing
//! duplicate network calls.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::Session;
use crate::auth::Credentials;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::transport::{RetryPolicy, SessionPayload, Transport};

/// Authenticates and owns the current [`Session`]
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    retry: RetryPolicy,
    current: RwLock<Option<Session>>,
    /// Serializes refresh and re-login attempts
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    /// Create a manager that owns the given credentials.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry: RetryPolicy::new(retry),
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The account identifier these sessions belong to.
    pub fn account(&self) -> &str {
        self.credentials.account()
    }

    /// Perform a full login and install the resulting session.
    pub async fn authenticate(&self) -> Result<Session> {
        let _gate = self.refresh_gate.lock().await;
        self.login_locked().await
    }

    /// The current session. Fails with `NotAuthenticated` before the first
    /// successful login.
    pub async fn current(&self) -> Result<Session> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(Error::NotAuthenticated)
    }

    /// The current session, refreshed first if its validity window closed.
    /// An expired session is never handed out.
    pub async fn fresh(&self) -> Result<Session> {
        let session = self.current().await?;
        if !session.is_expired() {
            return Ok(session);
        }
        tracing::debug!(account = %self.account(), "session expired, refreshing");
        self.refresh_or_reauthenticate().await
    }

    /// Replace the current session: lightweight refresh when a refresh
    /// token is held, full re-login otherwise or when the refresh fails.
    ///
    /// Callers that lose the race for the gate return the session the
    /// winner installed rather than repeating its network calls.
    pub async fn refresh_or_reauthenticate(&self) -> Result<Session> {
        let observed = self.current.read().await.as_ref().map(|s| s.token.clone());
        let _gate = self.refresh_gate.lock().await;

        {
            let current = self.current.read().await;
            if let Some(session) = current.as_ref() {
                if Some(&session.token) != observed.as_ref() && !session.is_expired() {
                    return Ok(session.clone());
                }
            }
        }

        let refreshable = self
            .current
            .read()
            .await
            .clone()
            .filter(|s| s.refresh_token.is_some());

        if let Some(session) = refreshable {
            match self
                .retry
                .run("refresh", || {
                    let session = session.clone();
                    async move { self.transport.refresh(&session).await }
                })
                .await
            {
                Ok(payload) => return Ok(self.install(payload).await),
                Err(e) => {
                    tracing::warn!(
                        account = %self.account(),
                        error = %e,
                        "session refresh failed, falling back to full re-login"
                    );
                }
            }
        }

        self.login_locked().await
    }

    /// Login with the gate already held.
    async fn login_locked(&self) -> Result<Session> {
        let result = self
            .retry
            .run("login", || async move {
                self.transport.login(&self.credentials).await
            })
            .await;

        match result {
            Ok(payload) => {
                let session = self.install(payload).await;
                tracing::info!(account = %self.account(), "authenticated");
                Ok(session)
            }
            // Transient faults stay transport errors so the poll loop can
            // back off and retry; everything else is a credential rejection.
            Err(e) if e.is_retryable() => Err(e),
            Err(Error::Auth(message)) => Err(Error::Auth(message)),
            Err(other) => Err(Error::Auth(other.to_string())),
        }
    }

    async fn install(&self, payload: SessionPayload) -> Session {
        let session = Session::from_payload(payload);
        *self.current.write().await = Some(session.clone());
        session
    }
}
