//! WhatsApp Cloud API webhook payload shapes.
//!
//! Deliveries look like `{"object": "...", "entry": [{"changes": [{"field":
//! "messages", "value": {"contacts": [...], "messages": [...]}}]}]}`. Status
//! callbacks carry `statuses` instead of `messages` and yield no envelopes.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::inbound::{InboundContent, InboundEnvelope, MediaRef};

/// Top-level webhook delivery body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<ChangeValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    pub name: String,
}

/// A single message as sent by the provider, before type dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<RawText>,
    #[serde(default)]
    pub image: Option<RawMedia>,
    #[serde(default)]
    pub audio: Option<RawMedia>,
    #[serde(default)]
    pub document: Option<RawMedia>,
    #[serde(default)]
    pub video: Option<RawMedia>,
    #[serde(default)]
    pub sticker: Option<RawMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawText {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl RawMedia {
    fn media_ref(&self) -> MediaRef {
        MediaRef {
            media_id: self.id.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl RawMessage {
    /// Convert the provider shape into a typed content value.
    ///
    /// Returns `None` for message types outside the supported set
    /// (location, reaction, interactive, ...) or when the type-specific
    /// object is missing.
    pub fn content(&self) -> Option<InboundContent> {
        match self.message_type.as_str() {
            "text" => self.text.as_ref().map(|t| InboundContent::Text {
                body: t.body.clone(),
            }),
            "image" => self.image.as_ref().map(|m| InboundContent::Image {
                media: m.media_ref(),
                caption: m.caption.clone(),
            }),
            "audio" => self.audio.as_ref().map(|m| InboundContent::Audio {
                media: m.media_ref(),
            }),
            "document" => self.document.as_ref().map(|m| InboundContent::Document {
                media: m.media_ref(),
                caption: m.caption.clone(),
                filename: m.filename.clone(),
            }),
            "video" => self.video.as_ref().map(|m| InboundContent::Video {
                media: m.media_ref(),
                caption: m.caption.clone(),
            }),
            "sticker" => self.sticker.as_ref().map(|m| InboundContent::Sticker {
                media: m.media_ref(),
            }),
            _ => None,
        }
    }

    fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let secs: i64 = self.timestamp.as_deref()?.parse().ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }
}

impl WebhookPayload {
    /// Flatten every supported message in the delivery into envelopes.
    ///
    /// Contact names are matched to senders by `wa_id`. Status callbacks and
    /// unsupported message types produce nothing.
    pub fn into_envelopes(self) -> Vec<InboundEnvelope> {
        let mut envelopes = Vec::new();

        for entry in self.entry {
            for change in entry.changes {
                let Some(value) = change.value else {
                    continue;
                };

                for msg in &value.messages {
                    let Some(content) = msg.content() else {
                        continue;
                    };

                    let display_name = value
                        .contacts
                        .iter()
                        .find(|c| c.wa_id == msg.from)
                        .or_else(|| value.contacts.first())
                        .and_then(|c| c.profile.as_ref())
                        .map(|p| p.name.clone());

                    envelopes.push(InboundEnvelope {
                        wa_message_id: msg.id.clone(),
                        from: msg.from.clone(),
                        display_name,
                        timestamp: msg.parsed_timestamp(),
                        content,
                    });
                }
            }
        }

        envelopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_text_message_envelope() {
        let p = payload(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "contacts": [{"wa_id": "5215512345678", "profile": {"name": "Ana"}}],
                        "messages": [{
                            "from": "5215512345678",
                            "id": "wamid.ABC",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "Hola"}
                        }]
                    }
                }]
            }]
        }));

        let envs = p.into_envelopes();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].wa_message_id, "wamid.ABC");
        assert_eq!(envs[0].display_name.as_deref(), Some("Ana"));
        assert_eq!(envs[0].content, InboundContent::Text { body: "Hola".into() });
        assert!(envs[0].timestamp.is_some());
    }

    #[test]
    fn test_status_callback_yields_nothing() {
        let p = payload(serde_json::json!({
            "entry": [{"changes": [{"field": "messages", "value": {
                "statuses": [{"id": "wamid.X", "status": "delivered"}]
            }}]}]
        }));
        assert!(p.into_envelopes().is_empty());
    }

    #[test]
    fn test_audio_message_maps_media_ref() {
        let p = payload(serde_json::json!({
            "entry": [{"changes": [{"value": {
                "messages": [{
                    "from": "521",
                    "id": "wamid.AUD",
                    "type": "audio",
                    "audio": {"id": "media-9", "mime_type": "audio/ogg; codecs=opus"}
                }]
            }}]}]
        }));
        let envs = p.into_envelopes();
        match &envs[0].content {
            InboundContent::Audio { media } => {
                assert_eq!(media.media_id, "media-9");
                assert_eq!(media.mime_type.as_deref(), Some("audio/ogg; codecs=opus"));
            }
            other => panic!("expected audio, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_type_is_skipped() {
        let p = payload(serde_json::json!({
            "entry": [{"changes": [{"value": {
                "messages": [{"from": "521", "id": "wamid.L", "type": "location"}]
            }}]}]
        }));
        assert!(p.into_envelopes().is_empty());
    }

    #[test]
    fn test_empty_body_is_default() {
        let p: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(p.into_envelopes().is_empty());
    }
}
