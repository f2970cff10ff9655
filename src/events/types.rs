//! Classified event types
//!
//! Categories and subcategories form a closed enumeration mirroring the
//! platform's event stream, with an explicit `Unclassified` fallback so
//! new shapes flow through wildcard handlers instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventCategory {
    /// Conversation-level events (messages, receipts, chat state)
    Chat,
    /// Unread chat counter updates
    BotUnreadChatCount,
    /// Bot profile and room membership updates
    BotInfo,
    /// Stream-level failure notifications from the platform
    Fail,
    /// Shape not recognized by the classifier
    Unclassified,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::BotUnreadChatCount => write!(f, "botUnreadChatCount"),
            Self::BotInfo => write!(f, "botInfo"),
            Self::Fail => write!(f, "fail"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "botUnreadChatCount" => Ok(Self::BotUnreadChatCount),
            "botInfo" => Ok(Self::BotInfo),
            "fail" => Ok(Self::Fail),
            "unclassified" => Ok(Self::Unclassified),
            other => Err(format!("unknown event category: {}", other)),
        }
    }
}

/// Event subcategory, discriminated by the payload's `subEvent` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventSubcategory {
    Message,
    MessageSent,
    Read,
    Typing,
    TypingVanished,
    NoteUpdated,
    MarkedAsManualChat,
    UnmarkedAsManualChat,
    ChatRead,
    AssigneeUpdated,
    Tagged,
    Increment,
    HasChatRoomChanged,
    #[serde(rename = "invalid_token")]
    InvalidToken,
    /// Missing or unrecognized `subEvent` discriminator
    Unclassified,
}

impl std::fmt::Display for EventSubcategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::MessageSent => "messageSent",
            Self::Read => "read",
            Self::Typing => "typing",
            Self::TypingVanished => "typingVanished",
            Self::NoteUpdated => "noteUpdated",
            Self::MarkedAsManualChat => "markedAsManualChat",
            Self::UnmarkedAsManualChat => "unmarkedAsManualChat",
            Self::ChatRead => "chatRead",
            Self::AssigneeUpdated => "assigneeUpdated",
            Self::Tagged => "tagged",
            Self::Increment => "increment",
            Self::HasChatRoomChanged => "hasChatRoomChanged",
            Self::InvalidToken => "invalid_token",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for EventSubcategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "messageSent" => Ok(Self::MessageSent),
            "read" => Ok(Self::Read),
            "typing" => Ok(Self::Typing),
            "typingVanished" => Ok(Self::TypingVanished),
            "noteUpdated" => Ok(Self::NoteUpdated),
            "markedAsManualChat" => Ok(Self::MarkedAsManualChat),
            "unmarkedAsManualChat" => Ok(Self::UnmarkedAsManualChat),
            "chatRead" => Ok(Self::ChatRead),
            "assigneeUpdated" => Ok(Self::AssigneeUpdated),
            "tagged" => Ok(Self::Tagged),
            "increment" => Ok(Self::Increment),
            "hasChatRoomChanged" => Ok(Self::HasChatRoomChanged),
            "invalid_token" => Ok(Self::InvalidToken),
            "unclassified" => Ok(Self::Unclassified),
            other => Err(format!("unknown event subcategory: {}", other)),
        }
    }
}

/// A classified inbound event
///
/// Immutable once built; the raw payload is preserved so wildcard handlers
/// can inspect shapes the classifier does not model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier assigned by the platform, used for dedup
    pub id: String,
    pub category: EventCategory,
    pub subcategory: EventSubcategory,
    /// Raw payload as received
    pub payload: serde_json::Value,
    /// When this process received the event
    pub received_at: DateTime<Utc>,
}
