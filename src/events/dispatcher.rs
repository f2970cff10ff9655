//! Event dispatch with per-handler isolation
//!
//! For each classified event the dispatcher resolves all matching
//! registrations and invokes them sequentially in the resolved order. A
//! failing handler is recorded and skipped over; it can never block other
//! handlers or the poll loop.

use std::sync::Arc;

use super::handler::{Context, EventHandler};
use super::registry::{HandlerRegistry, RegistrationId};
use super::types::{Event, EventCategory, EventSubcategory};
use crate::error::Error;

/// Record of one handler failure, isolated from the loop
#[derive(Debug)]
pub struct HandlerError {
    pub registration: RegistrationId,
    pub category: EventCategory,
    pub subcategory: EventSubcategory,
    pub event_id: String,
    pub source: Error,
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "handler {} failed for {}/{} event {}: {}",
            self.registration, self.category, self.subcategory, self.event_id, self.source
        )
    }
}

/// Fans classified events out to matching handlers
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    ctx: Context,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, ctx: Context) -> Self {
        Self { registry, ctx }
    }

    /// The registry this dispatcher resolves handlers from.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Invoke every matching handler for one event. Returns the failures
    /// that occurred; an empty vector means every handler succeeded.
    pub async fn dispatch(&self, event: &Event) -> Vec<HandlerError> {
        let matched = self.registry.lookup(event).await;
        tracing::trace!(
            event_id = %event.id,
            category = %event.category,
            subcategory = %event.subcategory,
            handlers = matched.len(),
            "dispatching event"
        );

        let mut failures = Vec::new();
        for (id, handler) in matched {
            if let Err(source) = handler.handle(self.ctx.clone(), event.clone()).await {
                tracing::warn!(
                    registration = %id,
                    event_id = %event.id,
                    error = %source,
                    "handler failed, continuing dispatch"
                );
                failures.push(HandlerError {
                    registration: id,
                    category: event.category,
                    subcategory: event.subcategory,
                    event_id: event.id.clone(),
                    source,
                });
            }
        }
        failures
    }
}
