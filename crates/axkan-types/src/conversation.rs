//! Conversation, message, and client types.
//!
//! A conversation is the thread tied to one WhatsApp id (`wa_id`). Messages
//! are immutable once stored and ordered by `created_at` within a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Whether a message arrived from the client or was sent by us.
///
/// Maps to the CHECK constraint `direction IN ('inbound', 'outbound')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(format!("invalid message direction: '{other}'")),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Client,
    Ai,
    Admin,
}

impl Sender {
    /// Prefix used when synthesizing an id for an outbound message the
    /// provider did not assign one to.
    pub fn synthetic_id_prefix(&self) -> &'static str {
        match self {
            Sender::Client => "client",
            Sender::Ai => "ai",
            Sender::Admin => "admin",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Client => write!(f, "client"),
            Sender::Ai => write!(f, "ai"),
            Sender::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Sender::Client),
            "ai" => Ok(Sender::Ai),
            "admin" => Ok(Sender::Admin),
            other => Err(format!("invalid message sender: '{other}'")),
        }
    }
}

/// The WhatsApp message type of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Document,
    Video,
    Sticker,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Video => "video",
            MessageKind::Sticker => "sticker",
        };
        f.write_str(s)
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "audio" => Ok(MessageKind::Audio),
            "document" => Ok(MessageKind::Document),
            "video" => Ok(MessageKind::Video),
            "sticker" => Ok(MessageKind::Sticker),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// A conversation thread with one WhatsApp contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// External thread id (the sender's WhatsApp id). Unique.
    pub wa_id: String,
    /// Linked client, set once by phone-suffix matching and never re-evaluated.
    pub client_id: Option<i64>,
    /// Latest display name seen on the contact profile.
    pub client_name: Option<String>,
    /// Monotonically non-decreasing.
    pub last_message_at: DateTime<Utc>,
    /// Advisory counter: incremented per inbound message, reset by an explicit read.
    pub unread_count: u32,
    /// Latest telemetry intent label.
    pub intent: Option<String>,
    pub ai_summary: Option<String>,
    /// Cached insight blob for the operator dashboard.
    pub insights: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation row plus list-view extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<String>,
    pub message_count: u32,
}

/// A stored message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Provider message id; the idempotency key for inbound messages.
    pub wa_message_id: Option<String>,
    pub direction: Direction,
    pub sender: Sender,
    pub kind: MessageKind,
    pub content: String,
    pub media_url: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a new message stamped with a fresh id and the current time.
    pub fn new(
        conversation_id: Uuid,
        wa_message_id: Option<String>,
        direction: Direction,
        sender: Sender,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            wa_message_id,
            direction,
            sender,
            kind,
            content: content.into(),
            media_url: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_media_url(mut self, url: Option<String>) -> Self {
        self.media_url = url;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A client record owned by the order system. Read and linked only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
}
