//! Handler registry
//!
//! Maps category/subcategory filters to ordered handler registrations.
//! The same filter pair may be registered any number of times; insertion
//! order is preserved and used as the tie-breaker inside each priority
//! group during lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::handler::EventHandler;
use super::types::{Event, EventCategory, EventSubcategory};
use crate::config::DispatchOrder;

/// Opaque handle returned by [`HandlerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category/subcategory filter; `None` matches any value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub subcategory: Option<EventSubcategory>,
}

impl EventFilter {
    /// Matches every event.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches every event of one category.
    pub fn category(category: EventCategory) -> Self {
        Self {
            category: Some(category),
            subcategory: None,
        }
    }

    /// Matches one exact category/subcategory pair.
    pub fn exact(category: EventCategory, subcategory: EventSubcategory) -> Self {
        Self {
            category: Some(category),
            subcategory: Some(subcategory),
        }
    }

    /// Whether this filter matches the given event.
    pub fn matches(&self, event: &Event) -> bool {
        self.category.map_or(true, |c| c == event.category)
            && self.subcategory.map_or(true, |s| s == event.subcategory)
    }

    /// Priority group: 0 = both filters exact, 1 = one wildcard,
    /// 2 = both wildcards.
    fn specificity(&self) -> usize {
        self.category.is_none() as usize + self.subcategory.is_none() as usize
    }
}

struct Registration {
    id: RegistrationId,
    order: u64,
    filter: EventFilter,
    handler: Arc<dyn EventHandler>,
}

/// Ordered collection of handler registrations
pub struct HandlerRegistry {
    registrations: RwLock<Vec<Registration>>,
    next_order: AtomicU64,
    order_mode: DispatchOrder,
}

impl HandlerRegistry {
    pub fn new(order_mode: DispatchOrder) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            next_order: AtomicU64::new(0),
            order_mode,
        }
    }

    /// Add a registration. Duplicate filters are retained, not merged.
    pub async fn register(
        &self,
        filter: EventFilter,
        handler: Arc<dyn EventHandler>,
    ) -> RegistrationId {
        let id = RegistrationId::new();
        let order = self.next_order.fetch_add(1, Ordering::SeqCst);
        self.registrations.write().await.push(Registration {
            id,
            order,
            filter,
            handler,
        });
        id
    }

    /// Remove a registration. A no-op when the id is unknown or already
    /// removed.
    pub async fn unregister(&self, id: RegistrationId) {
        self.registrations.write().await.retain(|r| r.id != id);
    }

    /// Number of live registrations.
    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    /// All handlers matching the event, grouped by filter specificity and
    /// ordered by registration index within each group.
    pub async fn lookup(&self, event: &Event) -> Vec<(RegistrationId, Arc<dyn EventHandler>)> {
        let registrations = self.registrations.read().await;

        let mut groups: [Vec<(u64, RegistrationId, Arc<dyn EventHandler>)>; 3] =
            [Vec::new(), Vec::new(), Vec::new()];
        for reg in registrations.iter().filter(|r| r.filter.matches(event)) {
            groups[reg.filter.specificity()].push((reg.order, reg.id, Arc::clone(&reg.handler)));
        }
        for group in &mut groups {
            group.sort_by_key(|(order, _, _)| *order);
        }

        let ordered: Vec<_> = match self.order_mode {
            DispatchOrder::SpecificFirst => groups.into_iter().flatten().collect(),
            DispatchOrder::WildcardFirst => groups.into_iter().rev().flatten().collect(),
        };
        ordered.into_iter().map(|(_, id, h)| (id, h)).collect()
    }
}
