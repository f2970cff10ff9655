//! Event acquisition loop
//!
//! Drives authentication and polling as a small state machine:
//!
//! ```text
//! Idle -> Authenticating -> Polling <-> Backoff -> Stopped
//! ```
//!
//! Each iteration fetches one batch, filters it through the dedup window,
//! classifies the remainder, and dispatches every event synchronously
//! before the next poll request: per-event ordering is strict and the
//! dedup window has a single writer. Failures back off exponentially and
//! trigger re-authentication; exhausting the consecutive-failure budget
//! stops the loop with a fatal error. The stop signal is honored at
//! iteration boundaries only, never mid-batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::events::{classify, DedupWindow, Dispatcher, EventCategory, EventSubcategory};
use crate::transport::TransportClient;

/// Poll loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Authenticating,
    Polling,
    Backoff,
    Stopped,
}

/// Drives the session-authenticated event acquisition loop
pub struct EventPoller {
    client: Arc<TransportClient>,
    dispatcher: Dispatcher,
    config: PollConfig,
    state: Arc<RwLock<PollerState>>,
    stop: watch::Receiver<bool>,
    window: DedupWindow,
    cursor: Option<String>,
}

impl EventPoller {
    pub fn new(
        client: Arc<TransportClient>,
        dispatcher: Dispatcher,
        config: PollConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let window = DedupWindow::new(config.dedup_capacity);
        Self {
            client,
            dispatcher,
            config,
            state: Arc::new(RwLock::new(PollerState::Idle)),
            stop,
            window,
            cursor: None,
        }
    }

    /// Shared handle to the loop state, for observation after `run` takes
    /// ownership.
    pub fn state_handle(&self) -> Arc<RwLock<PollerState>> {
        Arc::clone(&self.state)
    }

    /// Drive the loop until `stop` is signalled or the failure budget is
    /// exhausted. Returns `Ok` only for an explicit stop.
    pub async fn run(mut self) -> Result<()> {
        let mut consecutive_failures: u32 = 0;

        self.set_state(PollerState::Authenticating).await;
        loop {
            if self.stop_requested() {
                return self.finish().await;
            }
            match self.client.sessions().authenticate().await {
                Ok(_) => break,
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        error = %e,
                        failures = consecutive_failures,
                        "authentication failed"
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return self
                            .fatal(format!(
                                "authentication failed {} consecutive times: {}",
                                consecutive_failures, e
                            ))
                            .await;
                    }
                    self.set_state(PollerState::Backoff).await;
                    let delay = self.backoff_duration(consecutive_failures);
                    self.sleep_interruptible(delay).await;
                    self.set_state(PollerState::Authenticating).await;
                }
            }
        }
        consecutive_failures = 0;

        self.set_state(PollerState::Polling).await;
        tracing::info!(account = %self.client.sessions().account(), "event loop started");

        loop {
            if self.stop_requested() {
                return self.finish().await;
            }
            match self.poll_once().await {
                Ok(()) => {
                    consecutive_failures = 0;
                    self.sleep_interruptible(Duration::from_millis(self.config.interval_ms))
                        .await;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        error = %e,
                        failures = consecutive_failures,
                        "poll iteration failed"
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return self
                            .fatal(format!(
                                "poll failed {} consecutive times: {}",
                                consecutive_failures, e
                            ))
                            .await;
                    }

                    self.set_state(PollerState::Backoff).await;
                    if e.is_session_expired() || matches!(e, Error::Auth(_) | Error::NotAuthenticated)
                    {
                        if let Err(auth_err) =
                            self.client.sessions().refresh_or_reauthenticate().await
                        {
                            tracing::warn!(
                                error = %auth_err,
                                "re-authentication during backoff failed"
                            );
                        }
                    }
                    let delay = self.backoff_duration(consecutive_failures);
                    self.sleep_interruptible(delay).await;
                    self.set_state(PollerState::Polling).await;
                }
            }
        }
    }

    /// Fetch and process one batch: dedup, classify, dispatch, in arrival
    /// order. The batch always completes once started.
    async fn poll_once(&mut self) -> Result<()> {
        let batch = self.client.poll(self.cursor.as_deref()).await?;
        let mut session_invalidated = false;

        for raw in batch.events {
            if !self.window.insert(&raw.id) {
                tracing::debug!(event_id = %raw.id, "skipping already-delivered event");
                continue;
            }
            let event = classify(raw);
            if event.category == EventCategory::Fail
                && event.subcategory == EventSubcategory::InvalidToken
            {
                // The platform invalidated the streaming session in-band.
                // Handlers still see the event; re-auth happens afterwards.
                session_invalidated = true;
            }
            let failures = self.dispatcher.dispatch(&event).await;
            if !failures.is_empty() {
                tracing::warn!(
                    event_id = %event.id,
                    failed = failures.len(),
                    "handler failures during dispatch"
                );
            }
        }

        if let Some(cursor) = batch.next_cursor {
            self.cursor = Some(cursor);
        }

        if session_invalidated {
            return Err(Error::session_expired(
                "platform invalidated the streaming session",
            ));
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    async fn set_state(&self, next: PollerState) {
        *self.state.write().await = next;
    }

    async fn finish(&self) -> Result<()> {
        self.set_state(PollerState::Stopped).await;
        tracing::info!("event loop stopped");
        Ok(())
    }

    async fn fatal(&self, message: String) -> Result<()> {
        self.set_state(PollerState::Stopped).await;
        Err(Error::Fatal(message))
    }

    fn backoff_duration(&self, consecutive_failures: u32) -> Duration {
        let shift = consecutive_failures.saturating_sub(1).min(16);
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << shift)
            .min(self.config.backoff_cap_ms);
        Duration::from_millis(ms)
    }

    /// Sleep, waking early when stop is signalled.
    async fn sleep_interruptible(&mut self, duration: Duration) {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            _ = self.stop.changed() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::config::{DispatchOrder, RetryConfig};
    use crate::events::{Context, Event, EventFilter, FnHandler, HandlerRegistry};
    use crate::message::{Ack, OutboundMessage};
    use crate::session::{Session, SessionManager};
    use crate::transport::{PollBatch, RawEvent, SessionPayload, Transport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedTransport {
        login_calls: AtomicUsize,
        poll_calls: AtomicUsize,
        batches: Mutex<VecDeque<Result<PollBatch>>>,
    }

    impl ScriptedTransport {
        fn queue(&self, result: Result<PollBatch>) {
            self.batches.lock().unwrap().push_back(result);
        }

        fn queue_events(&self, events: Vec<RawEvent>) {
            self.queue(Ok(PollBatch {
                events,
                next_cursor: None,
            }));
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
            Err(Error::session_expired("no refresh token issued"))
        }

        async fn poll(&self, _session: &Session, _cursor: Option<&str>) -> Result<PollBatch> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.batches
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
            Ok(Ack {
                send_id: send_id.to_string(),
                message_id: None,
            })
        }
    }

    fn raw(id: &str, event: &str, data: serde_json::Value) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            event: event.to_string(),
            data,
        }
    }

    fn poll_config(max_failures: u32) -> PollConfig {
        PollConfig {
            interval_ms: 2,
            max_consecutive_failures: max_failures,
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
            dedup_capacity: 64,
        }
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            request_timeout_ms: 1_000,
            max_retries: 0,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        }
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        stop: watch::Sender<bool>,
        state: Arc<RwLock<PollerState>>,
        seen: Arc<Mutex<Vec<Event>>>,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    async fn start(transport: Arc<ScriptedTransport>, config: PollConfig) -> Harness {
        let sessions = Arc::new(SessionManager::new(
            transport.clone(),
            Credentials::Cookie {
                cookies: "ses=x".to_string(),
                account: "shop".to_string(),
            },
            retry_config(),
        ));
        let client = Arc::new(TransportClient::new(
            transport.clone(),
            sessions,
            retry_config(),
        ));

        let registry = Arc::new(HandlerRegistry::new(DispatchOrder::SpecificFirst));
        let seen: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry
            .register(
                EventFilter::any(),
                Arc::new(FnHandler(move |_ctx: Context, event: Event| {
                    let seen = seen_clone.clone();
                    async move {
                        seen.lock().unwrap().push(event);
                        Ok(())
                    }
                })),
            )
            .await;

        let dispatcher = Dispatcher::new(registry, Context::new(client.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let poller = EventPoller::new(client, dispatcher, config, stop_rx);
        let state = poller.state_handle();
        let task = tokio::spawn(poller.run());

        Harness {
            transport,
            stop: stop_tx,
            state,
            seen,
            task,
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_ids_across_batches_delivered_once() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_events(vec![raw("e2", "chat", json!({"subEvent": "message"}))]);
        transport.queue_events(vec![
            raw("e2", "chat", json!({"subEvent": "message"})),
            raw("e3", "chat", json!({"subEvent": "read"})),
        ]);
        let harness = start(transport, poll_config(5)).await;

        wait_for(|| harness.seen.lock().unwrap().len() >= 2).await;
        harness.stop.send(true).unwrap();
        harness.task.await.unwrap().unwrap();

        let seen = harness.seen.lock().unwrap();
        let ids: Vec<_> = seen.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["e2", "e3"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_malformed_event_does_not_abort_batch() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_events(vec![
            raw("bad", "???", json!("not an object")),
            raw("good", "chat", json!({"subEvent": "message", "text": "still here"})),
        ]);
        let harness = start(transport, poll_config(5)).await;

        wait_for(|| harness.seen.lock().unwrap().len() >= 2).await;
        harness.stop.send(true).unwrap();
        harness.task.await.unwrap().unwrap();

        let seen = harness.seen.lock().unwrap();
        assert_eq!(seen[0].category, EventCategory::Unclassified);
        assert_eq!(seen[1].id, "good");
        assert_eq!(seen[1].subcategory, EventSubcategory::Message);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_band_token_invalidation_reauthenticates_and_resumes() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.queue_events(vec![raw("f1", "fail", json!({"subEvent": "invalid_token"}))]);
        transport.queue_events(vec![raw("e9", "chat", json!({"subEvent": "message"}))]);
        let harness = start(transport.clone(), poll_config(5)).await;

        wait_for(|| {
            harness
                .seen
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.id == "e9")
        })
        .await;
        harness.stop.send(true).unwrap();
        harness.task.await.unwrap().unwrap();

        // The failure event itself reached handlers, then the loop
        // re-authenticated (initial login plus at least one more).
        let seen = harness.seen.lock().unwrap();
        assert_eq!(seen[0].category, EventCategory::Fail);
        assert!(transport.login_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_transport_expiry_recovers_within_budget() {
        let transport = Arc::new(ScriptedTransport::default());
        // The client replays once after re-auth; two rejections in a row
        // surface to the poller, which backs off, re-authenticates, and
        // resumes.
        transport.queue(Err(Error::session_expired("401")));
        transport.queue(Err(Error::session_expired("401")));
        transport.queue_events(vec![raw("e5", "chat", json!({"subEvent": "message"}))]);
        let harness = start(transport.clone(), poll_config(5)).await;

        wait_for(|| !harness.seen.lock().unwrap().is_empty()).await;
        harness.stop.send(true).unwrap();
        harness.task.await.unwrap().unwrap();

        assert_eq!(harness.seen.lock().unwrap()[0].id, "e5");
        assert!(transport.login_calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(*harness.state.read().await, PollerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_budget_exhaustion_is_fatal() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..4 {
            transport.queue(Err(Error::retryable("503")));
        }
        let harness = start(transport, poll_config(3)).await;

        let result = harness.task.await.unwrap();
        assert!(matches!(result, Err(Error::Fatal(_))));
        assert_eq!(*harness.state.read().await, PollerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_is_graceful() {
        let transport = Arc::new(ScriptedTransport::default());
        let harness = start(transport.clone(), poll_config(5)).await;

        wait_for(|| transport.poll_calls.load(Ordering::SeqCst) >= 2).await;
        harness.stop.send(true).unwrap();
        let result = harness.task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(*harness.state.read().await, PollerState::Stopped);
    }

    #[tokio::test]
    async fn test_backoff_grows_and_caps() {
        let transport = Arc::new(ScriptedTransport::default());
        let sessions = Arc::new(SessionManager::new(
            transport.clone(),
            Credentials::Cookie {
                cookies: "ses=x".to_string(),
                account: "shop".to_string(),
            },
            retry_config(),
        ));
        let client = Arc::new(TransportClient::new(transport, sessions, retry_config()));
        let registry = Arc::new(HandlerRegistry::new(DispatchOrder::SpecificFirst));
        let dispatcher = Dispatcher::new(registry, Context::new(client.clone()));
        let (_tx, rx) = watch::channel(false);
        let poller = EventPoller::new(
            client,
            dispatcher,
            PollConfig {
                interval_ms: 1,
                max_consecutive_failures: 10,
                backoff_base_ms: 100,
                backoff_cap_ms: 350,
                dedup_capacity: 8,
            },
            rx,
        );

        assert_eq!(poller.backoff_duration(1).as_millis(), 100);
        assert_eq!(poller.backoff_duration(2).as_millis(), 200);
        assert_eq!(poller.backoff_duration(3).as_millis(), 350);
        assert_eq!(poller.backoff_duration(9).as_millis(), 350);
    }
}
