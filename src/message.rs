//! Outbound message composition
//!
//! Builds the payloads accepted by the platform send endpoint. Text
//! messages may carry inline emoji markers of the form
//! `[EM:<productId>,id=<emojiId>]`; these are extracted into emoji
//! descriptors and collapsed to a single placeholder glyph, shifting the
//! indices of any following markers accordingly.

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

const EMOJI_PATTERN: &str = r"\[EM:([\w\d]+),id=([\w\d]+)\]";

/// Inline emoji descriptor referenced from message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emoji {
    pub product_id: String,
    pub emoji_id: String,
    pub length: usize,
    pub index: usize,
}

/// Outbound message payloads understood by the send endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Plain text, optionally with inline emojis and a quoted message
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emojis: Option<Vec<Emoji>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        quote_token: Option<String>,
    },

    /// Sticker from an owned sticker package
    #[serde(rename_all = "camelCase")]
    Sticker {
        package_id: u64,
        sticker_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        quote_token: Option<String>,
    },

    /// Pre-built card message
    #[serde(rename_all = "camelCase")]
    CardType { card_type_message_id: String },
}

impl OutboundMessage {
    /// Build a text message, extracting any inline emoji markers.
    pub fn text(text: impl Into<String>) -> Self {
        let raw = text.into();
        let emojis = extract_emojis(&raw);
        let text = if emojis.is_some() {
            strip_emoji_markers(&raw)
        } else {
            raw
        };
        Self::Text {
            text,
            emojis,
            quote_token: None,
        }
    }

    /// Build a text message quoting another message.
    pub fn text_with_quote(text: impl Into<String>, quote_token: impl Into<String>) -> Self {
        match Self::text(text) {
            Self::Text { text, emojis, .. } => Self::Text {
                text,
                emojis,
                quote_token: Some(quote_token.into()),
            },
            other => other,
        }
    }

    /// Build a sticker message.
    pub fn sticker(package_id: u64, sticker_id: u64) -> Self {
        Self::Sticker {
            package_id,
            sticker_id,
            quote_token: None,
        }
    }
}

/// Acknowledgement returned by the send endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Client-generated idempotency key echoed back
    pub send_id: String,
    /// Server-assigned message identifier, when the platform returns one
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Generate a client-side send identifier for one outbound message.
///
/// Contact id, millisecond timestamp, and a random suffix, underscore-joined.
pub fn make_send_id(contact_id: &str) -> String {
    let suffix: u64 = rand::thread_rng().gen_range(0..100_000_000);
    format!(
        "{}_{}_{}",
        contact_id,
        Utc::now().timestamp_millis(),
        suffix
    )
}

/// Extract inline emoji markers from raw text.
///
/// Each marker is later rendered as a single glyph, so the recorded index
/// of every following marker is shifted left by the marker's width minus
/// one. Returns `None` when the text carries no markers.
pub fn extract_emojis(raw_text: &str) -> Option<Vec<Emoji>> {
    let pattern = Regex::new(EMOJI_PATTERN).expect("emoji pattern is valid");
    let mut emojis = Vec::new();
    let mut gap = 0;
    for caps in pattern.captures_iter(raw_text) {
        let whole = caps.get(0).expect("capture 0 always present");
        let index = whole.start() - gap;
        gap += whole.end() - whole.start() - 1;
        emojis.push(Emoji {
            product_id: caps[1].to_string(),
            emoji_id: caps[2].to_string(),
            length: 1,
            index,
        });
    }
    if emojis.is_empty() {
        None
    } else {
        Some(emojis)
    }
}

/// Collapse every inline emoji marker to the placeholder glyph.
pub fn strip_emoji_markers(raw_text: &str) -> String {
    let pattern = Regex::new(EMOJI_PATTERN).expect("emoji pattern is valid");
    pattern.replace_all(raw_text, "$").into_owned()
}
