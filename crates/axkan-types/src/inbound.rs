//! Inbound message envelope handed from webhook ingress to the turn pipeline.
//!
//! `InboundContent` is a closed sum type over the supported WhatsApp message
//! types; every consumer matches it exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::MessageKind;

/// A reference to provider-hosted media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Provider media id, resolved to a download URL through the Graph API.
    pub media_id: String,
    pub mime_type: Option<String>,
}

/// Type-specific payload of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundContent {
    Text {
        body: String,
    },
    Image {
        media: MediaRef,
        caption: Option<String>,
    },
    Audio {
        media: MediaRef,
    },
    Document {
        media: MediaRef,
        caption: Option<String>,
        filename: Option<String>,
    },
    Video {
        media: MediaRef,
        caption: Option<String>,
    },
    Sticker {
        media: MediaRef,
    },
}

impl InboundContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundContent::Text { .. } => MessageKind::Text,
            InboundContent::Image { .. } => MessageKind::Image,
            InboundContent::Audio { .. } => MessageKind::Audio,
            InboundContent::Document { .. } => MessageKind::Document,
            InboundContent::Video { .. } => MessageKind::Video,
            InboundContent::Sticker { .. } => MessageKind::Sticker,
        }
    }

    /// The user-supplied caption (or text body), if any.
    pub fn caption(&self) -> Option<&str> {
        match self {
            InboundContent::Text { body } => Some(body.as_str()),
            InboundContent::Image { caption, .. }
            | InboundContent::Document { caption, .. }
            | InboundContent::Video { caption, .. } => caption.as_deref(),
            InboundContent::Audio { .. } | InboundContent::Sticker { .. } => None,
        }
    }
}

/// One inbound message extracted from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Provider message id (`wamid...`). The idempotency key.
    pub wa_message_id: String,
    /// Sender WhatsApp id, which is also the conversation thread id.
    pub from: String,
    /// Contact profile name, when the provider sent one.
    pub display_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: InboundContent,
}

impl InboundEnvelope {
    /// Display name, falling back to the sender id.
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> MediaRef {
        MediaRef {
            media_id: "m1".to_string(),
            mime_type: Some("image/jpeg".to_string()),
        }
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            InboundContent::Text { body: "hi".into() }.kind(),
            MessageKind::Text
        );
        assert_eq!(InboundContent::Audio { media: media() }.kind(), MessageKind::Audio);
        assert_eq!(InboundContent::Sticker { media: media() }.kind(), MessageKind::Sticker);
    }

    #[test]
    fn test_caption_for_media_without_caption() {
        let content = InboundContent::Image {
            media: media(),
            caption: None,
        };
        assert!(content.caption().is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_sender() {
        let env = InboundEnvelope {
            wa_message_id: "wamid.1".into(),
            from: "5215512345678".into(),
            display_name: None,
            timestamp: None,
            content: InboundContent::Text { body: "hola".into() },
        };
        assert_eq!(env.display_name_or_id(), "5215512345678");
    }
}
