//! Resilient wrapper around the abstract transport
//!
//! Every operation gets a timeout, bounded retries with exponential
//! backoff and jitter for transient failures, and a single automatic
//! re-authentication (followed by one replay) when the platform rejects
//! the session mid-call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::timeout;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::message::{make_send_id, Ack, OutboundMessage};
use crate::session::SessionManager;
use crate::transport::{PollBatch, Transport};

/// Timeout and retry schedule shared by all transport operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Timeout applied to a single call attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    /// Retries allowed for transient failures.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Backoff before retry `attempt` (1-based): exponential growth capped
    /// at the configured ceiling, jittered into the upper half of the
    /// capped value.
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let exp = self.config.backoff_base_ms.saturating_mul(1u64 << shift);
        let capped = exp.min(self.config.backoff_cap_ms).max(1);
        let jitter = rand::thread_rng().gen_range(0..=capped / 2);
        Duration::from_millis(capped - capped / 2 + jitter)
    }

    /// Run one operation under this policy: timeout per attempt, retries
    /// for transient failures only.
    pub async fn run<R, F, Fut>(&self, op: &str, call: F) -> Result<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = match timeout(self.timeout(), call()).await {
                Ok(result) => result,
                Err(_) => Err(Error::retryable(format!(
                    "{} timed out after {}ms",
                    op, self.config.request_timeout_ms
                ))),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries() => {
                    attempt += 1;
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Session-aware transport client used by the poller and by handlers
pub struct TransportClient {
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionManager>,
    retry: RetryPolicy,
}

impl TransportClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        sessions: Arc<SessionManager>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            sessions,
            retry: RetryPolicy::new(retry),
        }
    }

    /// The session manager backing this client.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Fetch the next batch of inbound events.
    pub async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch> {
        self.execute("poll", |session| async move {
            self.transport.poll(&session, cursor).await
        })
        .await
    }

    /// Deliver one outbound message. The send identifier is generated once
    /// per logical send, so retries and the post-reauth replay reuse it and
    /// the platform can deduplicate.
    pub async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<Ack> {
        let send_id = make_send_id(contact_id);
        let send_id = send_id.as_str();
        self.execute("send", |session| async move {
            self.transport
                .send(&session, contact_id, message, send_id)
                .await
        })
        .await
    }

    /// Run one session-authenticated operation: acquire a live session,
    /// apply the retry policy, and on a session rejection refresh once and
    /// replay the original call once.
    async fn execute<R, F, Fut>(&self, op: &str, call: F) -> Result<R>
    where
        F: Fn(crate::session::Session) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut attempt: u32 = 0;
        let mut reauthenticated = false;
        loop {
            let session = self.sessions.fresh().await?;
            let result = match timeout(self.retry.timeout(), call(session)).await {
                Ok(result) => result,
                Err(_) => Err(Error::retryable(format!("{} timed out", op))),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_session_expired() && !reauthenticated => {
                    reauthenticated = true;
                    tracing::debug!(op, "session rejected mid-call, re-authenticating");
                    self.sessions.refresh_or_reauthenticate().await?;
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries() => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::session::Session;
    use crate::transport::SessionPayload;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct ScriptedTransport {
        login_calls: AtomicUsize,
        poll_results: Mutex<VecDeque<Result<PollBatch>>>,
        send_results: Mutex<VecDeque<Result<Ack>>>,
        send_ids: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn queue_poll(&self, result: Result<PollBatch>) {
            self.poll_results.lock().unwrap().push_back(result);
        }

        fn queue_send(&self, result: Result<Ack>) {
            self.send_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn login(&self, _credentials: &Credentials) -> Result<SessionPayload> {
            let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionPayload {
                token: format!("tok-{}", n),
                refresh_token: None,
                expires_in_secs: None,
            })
        }

        async fn refresh(&self, _session: &Session) -> Result<SessionPayload> {
            Err(Error::session_expired("no refresh in this test"))
        }

        async fn poll(&self, _session: &Session, _cursor: Option<&str>) -> Result<PollBatch> {
            self.poll_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PollBatch::default()))
        }

        async fn send(
            &self,
            _session: &Session,
            _contact_id: &str,
            _message: &OutboundMessage,
            send_id: &str,
        ) -> Result<Ack> {
            self.send_ids.lock().unwrap().push(send_id.to_string());
            self.send_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(Ack {
                        send_id: send_id.to_string(),
                        message_id: Some("m-1".to_string()),
                    })
                })
        }
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            request_timeout_ms: 1_000,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        }
    }

    async fn client(transport: Arc<ScriptedTransport>) -> TransportClient {
        let sessions = Arc::new(SessionManager::new(
            transport.clone(),
            Credentials::Cookie {
                cookies: "ses=abc".to_string(),
                account: "my-shop".to_string(),
            },
            retry_config(),
        ));
        sessions.authenticate().await.unwrap();
        TransportClient::new(transport, sessions, retry_config())
    }

    #[tokio::test]
    async fn test_poll_retries_transient_failures() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_poll(Err(Error::retryable("503")));
        transport.queue_poll(Err(Error::retryable("connection reset")));
        transport.queue_poll(Ok(PollBatch::default()));
        let client = client(transport).await;

        assert_ok!(client.poll(None).await);
    }

    #[tokio::test]
    async fn test_poll_surfaces_terminal_immediately() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_poll(Err(Error::terminal("bad cursor")));
        transport.queue_poll(Ok(PollBatch::default()));
        let client = client(transport.clone()).await;

        let err = client.poll(None).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        // The queued success was never consumed: no retry happened.
        assert_eq!(transport.poll_results.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_reauthenticates_once_and_replays() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_poll(Err(Error::session_expired("401")));
        transport.queue_poll(Ok(PollBatch::default()));
        let client = client(transport.clone()).await;

        assert_ok!(client.poll(None).await);
        // Initial login plus the automatic re-login after the rejection.
        assert_eq!(transport.login_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_session_rejection_surfaces() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_poll(Err(Error::session_expired("401")));
        transport.queue_poll(Err(Error::session_expired("401 again")));
        let client = client(transport).await;

        let err = client.poll(None).await.unwrap_err();
        assert!(err.is_session_expired());
    }

    #[tokio::test]
    async fn test_send_id_stable_across_retries() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_send(Err(Error::retryable("502")));
        let client = client(transport.clone()).await;

        let ack = client
            .send("contact-1", &OutboundMessage::text("hi"))
            .await
            .unwrap();

        let ids = transport.send_ids.lock().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ack.send_id, ids[0]);
    }

    #[test]
    fn test_delay_is_capped_and_jittered() {
        let policy = RetryPolicy::new(RetryConfig {
            request_timeout_ms: 1_000,
            max_retries: 5,
            backoff_base_ms: 100,
            backoff_cap_ms: 400,
        });
        for attempt in 1..=10 {
            let delay = policy.delay(attempt).as_millis() as u64;
            assert!(delay <= 400, "delay {} exceeds cap", delay);
            assert!(delay >= 50, "delay {} below half the base", delay);
        }
    }
}
