//! Bizbot - Event-driven bot framework for business messaging platforms
//!
//! Bizbot logs into a business messaging account, continuously retrieves
//! inbound events (messages, read receipts, typing indicators, chat-state
//! changes), and routes each one to user-registered handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Bot                               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                      Event Poller                      │  │
//! │  │   poll → dedup window → classifier → dispatcher        │  │
//! │  └──────────┬─────────────────────────────────┬───────────┘  │
//! │             │                                 │              │
//! │  ┌──────────▼───────────┐        ┌────────────▼───────────┐  │
//! │  │   Transport Client   │        │    Handler Registry    │  │
//! │  │  timeout · retry ·   │        │  (category, subcat.)   │  │
//! │  │  backoff · reauth    │        │   → ordered handlers   │  │
//! │  └──────────┬───────────┘        └────────────────────────┘  │
//! │             │                                                │
//! │  ┌──────────▼───────────┐                                    │
//! │  │   Session Manager    │  coalesced refresh / re-login      │
//! │  └──────────┬───────────┘                                    │
//! └─────────────┼────────────────────────────────────────────────┘
//!               │ Transport trait (login / refresh / poll / send)
//!       ┌───────▼────────┐
//!       │    Platform    │
//!       └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bizbot::{Bot, Credentials, EventCategory, EventSubcategory};
//!
//! # async fn example() -> bizbot::Result<()> {
//! let bot = Arc::new(
//!     Bot::builder()
//!         .credentials(Credentials::Password {
//!             email: "shop@example.com".into(),
//!             secret: std::env::var("BIZBOT_PASSWORD").unwrap_or_default(),
//!             account: "my-shop".into(),
//!         })
//!         .build()?,
//! );
//!
//! bot.handle_fn(
//!     Some(EventCategory::Chat),
//!     Some(EventSubcategory::Message),
//!     |ctx, event| async move {
//!         if let Some(contact) = event.payload["source"]["contactId"].as_str() {
//!             ctx.send_text(contact, "got your message").await?;
//!         }
//!         Ok(())
//!     },
//! )
//! .await;
//!
//! bot.run().await
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`bot`]: orchestrator and public registration surface
//! - [`poller`]: the authenticated event-acquisition loop
//! - [`events`]: classification, dedup, registry, and dispatch
//! - [`transport`]: abstract platform boundary and the HTTP binding
//! - [`session`]: session state and refresh lifecycle
//! - [`auth`]: login material
//! - [`message`]: outbound message composition
//! - [`config`]: configuration management

pub mod auth;
pub mod bot;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod poller;
pub mod session;
pub mod transport;

pub use auth::Credentials;
pub use bot::{Bot, BotBuilder};
pub use config::BotConfig;
pub use error::{Error, Result};
pub use events::{
    Context, Event, EventCategory, EventFilter, EventHandler, EventSubcategory, FnHandler,
    RegistrationId,
};
pub use message::OutboundMessage;
pub use poller::PollerState;
pub use transport::{HttpTransport, Transport};
