//! Top-level bot orchestrator
//!
//! Wires the session manager, transport client, handler registry, and
//! event poller together behind a small public surface: register handlers,
//! `run()` until stopped or fatal, `stop()` gracefully.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use crate::auth::Credentials;
use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::events::{
    Context, Dispatcher, Event, EventCategory, EventFilter, EventHandler, EventSubcategory,
    FnHandler, HandlerRegistry, RegistrationId,
};
use crate::poller::{EventPoller, PollerState};
use crate::session::SessionManager;
use crate::transport::{HttpTransport, Transport, TransportClient};

/// A bot bound to one account on one platform transport
pub struct Bot {
    config: BotConfig,
    registry: Arc<HandlerRegistry>,
    client: Arc<TransportClient>,
    stop: watch::Sender<bool>,
    poller_state: RwLock<Option<Arc<RwLock<PollerState>>>>,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    /// Register a handler for events matching the given filters. `None`
    /// means wildcard; no filters at all matches every event.
    pub async fn handle(
        &self,
        category: Option<EventCategory>,
        subcategory: Option<EventSubcategory>,
        handler: Arc<dyn EventHandler>,
    ) -> RegistrationId {
        let filter = EventFilter {
            category,
            subcategory,
        };
        let id = self.registry.register(filter, handler).await;
        tracing::debug!(
            registration = %id,
            category = ?category,
            subcategory = ?subcategory,
            "handler registered"
        );
        id
    }

    /// Register an async closure as a handler.
    pub async fn handle_fn<F, Fut>(
        &self,
        category: Option<EventCategory>,
        subcategory: Option<EventSubcategory>,
        f: F,
    ) -> RegistrationId
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handle(category, subcategory, Arc::new(FnHandler(f)))
            .await
    }

    /// Remove a registration. A no-op when already removed.
    pub async fn remove_handler(&self, id: RegistrationId) {
        self.registry.unregister(id).await;
    }

    /// A context for outbound calls from outside handler code.
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.client))
    }

    /// Authenticate and drive the event loop. Blocks until [`Bot::stop`]
    /// is called (returns `Ok`) or recovery budgets are exhausted
    /// (returns the fatal error).
    pub async fn run(&self) -> Result<()> {
        self.stop.send_replace(false);

        let dispatcher = Dispatcher::new(Arc::clone(&self.registry), self.context());
        let poller = EventPoller::new(
            Arc::clone(&self.client),
            dispatcher,
            self.config.poll.clone(),
            self.stop.subscribe(),
        );
        *self.poller_state.write().await = Some(poller.state_handle());

        poller.run().await
    }

    /// Signal the poller to stop after finishing its current batch.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Current state of the poll loop.
    pub async fn state(&self) -> PollerState {
        match self.poller_state.read().await.as_ref() {
            Some(state) => *state.read().await,
            None => PollerState::Idle,
        }
    }
}

/// Builder for [`Bot`]
pub struct BotBuilder {
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Credentials>,
    config: BotConfig,
}

impl BotBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            credentials: None,
            config: BotConfig::default(),
        }
    }

    /// Use a custom transport. Without this, the bundled HTTP binding is
    /// built from `config.http`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Bot> {
        let credentials = self
            .credentials
            .ok_or_else(|| Error::Config("credentials are required".to_string()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.http.clone())?),
        };

        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&transport),
            credentials,
            self.config.retry.clone(),
        ));
        let client = Arc::new(TransportClient::new(
            transport,
            sessions,
            self.config.retry.clone(),
        ));
        let registry = Arc::new(HandlerRegistry::new(self.config.dispatch.order));
        let (stop, _) = watch::channel(false);

        Ok(Bot {
            config: self.config,
            registry,
            client,
            stop,
            poller_state: RwLock::new(None),
        })
    }
}

impl Default for BotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
