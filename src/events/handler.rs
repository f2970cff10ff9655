//! Handler trait and dispatch context
//!
//! Handlers are async callbacks registered against category/subcategory
//! filters. Each invocation receives a [`Context`] through which it can
//! call back into the transport (replies, typing indicators) using the
//! current session transparently.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::Event;
use crate::error::Result;
use crate::message::{Ack, OutboundMessage};
use crate::transport::TransportClient;

/// Callback invoked for each matching event
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: Context, event: Event) -> Result<()>;
}

/// Adapts an async closure into an [`EventHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Context, event: Event) -> Result<()> {
        (self.0)(ctx, event).await
    }
}

/// Capabilities available to handlers during dispatch
#[derive(Clone)]
pub struct Context {
    client: Arc<TransportClient>,
}

impl Context {
    pub fn new(client: Arc<TransportClient>) -> Self {
        Self { client }
    }

    /// The underlying transport client, for operations without a helper.
    pub fn transport(&self) -> &Arc<TransportClient> {
        &self.client
    }

    /// Send one outbound message to a contact.
    pub async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<Ack> {
        self.client.send(contact_id, message).await
    }

    /// Send a plain text reply.
    pub async fn send_text(&self, contact_id: &str, text: &str) -> Result<Ack> {
        self.client.send(contact_id, &OutboundMessage::text(text)).await
    }
}
