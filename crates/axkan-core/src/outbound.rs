//! Outbound dispatcher: sends replies and records them in the conversation.
//!
//! Every send is stored as an outbound message whether or not the provider
//! accepted it, so operators see exactly what the bot tried to say. When the
//! provider returns no message id one is synthesized from the sender.

use axkan_types::catalog::CatalogItem;
use axkan_types::conversation::{Conversation, Direction, Message, MessageKind, Sender};
use axkan_types::error::ProviderError;
use axkan_types::order::OutboundMediaDirective;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::catalog::find_product;
use crate::channel::api::WhatsAppApi;
use crate::repository::conversation::ConversationRepository;

/// An image to send, with an optional caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundImage {
    pub url: String,
    pub caption: Option<String>,
}

impl From<OutboundMediaDirective> for OutboundImage {
    fn from(d: OutboundMediaDirective) -> Self {
        Self {
            url: d.media_url,
            caption: Some(d.product_name),
        }
    }
}

/// Everything to send back for one turn or operator action.
#[derive(Debug, Clone, Default)]
pub struct OutboundReply {
    pub text: Option<String>,
    pub images: Vec<OutboundImage>,
    /// Merged into the metadata of every stored message.
    pub metadata: Value,
}

/// What was delivered and stored.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub text_delivered: bool,
    pub images_delivered: usize,
    pub images_failed: usize,
    pub stored: Vec<Message>,
}

/// Resolve requested product photos against the catalog.
///
/// Names with no match, or matching a product without an image, are dropped.
pub fn resolve_images(requests: &[String], catalog: &[CatalogItem]) -> Vec<OutboundMediaDirective> {
    requests
        .iter()
        .filter_map(|name| {
            let product = find_product(catalog, name)?;
            match product.image_url.as_deref().filter(|u| !u.is_empty()) {
                Some(url) => Some(OutboundMediaDirective {
                    product_name: product.name.clone(),
                    media_url: url.to_string(),
                }),
                None => {
                    debug!(product = %name, "requested image has no catalog media, dropping");
                    None
                }
            }
        })
        .collect()
}

/// Synthesized provider id for an outbound message, e.g. `ai_<uuid>`.
pub fn synthetic_message_id(sender: Sender) -> String {
    format!("{}_{}", sender.synthetic_id_prefix(), Uuid::now_v7())
}

/// Sends replies through the channel and records them.
pub struct OutboundDispatcher<'a, A, R> {
    api: &'a A,
    repo: &'a R,
}

impl<'a, A: WhatsAppApi, R: ConversationRepository> OutboundDispatcher<'a, A, R> {
    pub fn new(api: &'a A, repo: &'a R) -> Self {
        Self { api, repo }
    }

    /// Send the text first, then each image. A failed send is logged and
    /// does not stop the remaining sends.
    pub async fn deliver(
        &self,
        conversation: &Conversation,
        sender: Sender,
        reply: &OutboundReply,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let to = conversation.wa_id.as_str();

        if let Some(text) = reply.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let result = self.api.send_text(to, text).await;
            report.text_delivered = result.is_ok();
            let message = Message::new(
                conversation.id,
                None,
                Direction::Outbound,
                sender,
                MessageKind::Text,
                text,
            );
            if let Some(stored) = self.record(message, sender, result, &reply.metadata).await {
                report.stored.push(stored);
            }
        }

        for image in &reply.images {
            let result = self
                .api
                .send_image(to, &image.url, image.caption.as_deref())
                .await;
            if result.is_ok() {
                report.images_delivered += 1;
            } else {
                report.images_failed += 1;
            }
            let message = Message::new(
                conversation.id,
                None,
                Direction::Outbound,
                sender,
                MessageKind::Image,
                image.caption.clone().unwrap_or_default(),
            )
            .with_media_url(Some(image.url.clone()));
            if let Some(stored) = self.record(message, sender, result, &reply.metadata).await {
                report.stored.push(stored);
            }
        }

        if !report.stored.is_empty() {
            if let Err(e) = self.repo.touch(&conversation.id, Utc::now()).await {
                warn!(conversation_id = %conversation.id, error = %e, "failed to touch conversation");
            }
        }

        report
    }

    async fn record(
        &self,
        mut message: Message,
        sender: Sender,
        result: Result<Option<String>, ProviderError>,
        extra: &Value,
    ) -> Option<Message> {
        let mut metadata = match extra {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };

        let wa_message_id = match result {
            Ok(Some(id)) => id,
            Ok(None) => synthetic_message_id(sender),
            Err(e) => {
                warn!(
                    conversation_id = %message.conversation_id,
                    kind = %message.kind,
                    error = %e,
                    "outbound send failed"
                );
                metadata.insert("delivery_error".into(), json!(e.to_string()));
                synthetic_message_id(sender)
            }
        };
        metadata.insert(
            "delivered".into(),
            json!(!metadata.contains_key("delivery_error")),
        );
        message.wa_message_id = Some(wa_message_id);
        message.metadata = Value::Object(metadata);

        match self.repo.insert_message(&message).await {
            Ok(_) => Some(message),
            Err(e) => {
                error!(
                    conversation_id = %message.conversation_id,
                    error = %e,
                    "failed to store outbound message"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryRepo, RecordingApi, Sent};

    fn product(name: &str, image: Option<&str>) -> CatalogItem {
        CatalogItem {
            name: name.into(),
            price: 10.0,
            description: None,
            category: None,
            cost: 1.0,
            image_url: image.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_images_drops_unmatched() {
        let catalog = vec![
            product("Imanes", Some("https://cdn/imanes.jpg")),
            product("Llaveros", None),
        ];
        let resolved = resolve_images(
            &["imanes".into(), "Llaveros".into(), "Tazas".into()],
            &catalog,
        );
        assert_eq!(
            resolved,
            vec![OutboundMediaDirective {
                product_name: "Imanes".into(),
                media_url: "https://cdn/imanes.jpg".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_image_is_recorded_and_later_images_still_sent() {
        let repo = MemoryRepo::default();
        let api = RecordingApi {
            failing_image_url: Some("https://cdn/llaveros.jpg".into()),
            ..Default::default()
        };
        let conversation = repo
            .upsert_conversation("5215512345678", "Ana", Utc::now())
            .await
            .unwrap();

        let reply = OutboundReply {
            text: Some("Mira nuestros productos".into()),
            images: ["imanes", "llaveros", "tazas"]
                .iter()
                .map(|name| OutboundImage {
                    url: format!("https://cdn/{name}.jpg"),
                    caption: Some(name.to_string()),
                })
                .collect(),
            metadata: json!({ "intent": "product_inquiry" }),
        };
        let report = OutboundDispatcher::new(&api, &repo)
            .deliver(&conversation, Sender::Ai, &reply)
            .await;

        assert!(report.text_delivered);
        assert_eq!(report.images_delivered, 2);
        assert_eq!(report.images_failed, 1);

        let attempted: Vec<String> = api
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Image { url, .. } => Some(url),
                Sent::Text { .. } => None,
            })
            .collect();
        assert_eq!(
            attempted,
            vec![
                "https://cdn/imanes.jpg",
                "https://cdn/llaveros.jpg",
                "https://cdn/tazas.jpg"
            ]
        );

        let stored = repo.messages();
        assert_eq!(stored.len(), 4);
        let delivered: Vec<bool> = stored
            .iter()
            .map(|m| m.metadata["delivered"].as_bool().unwrap())
            .collect();
        assert_eq!(delivered, vec![true, true, false, true]);
        let failed = &stored[2];
        assert_eq!(failed.media_url.as_deref(), Some("https://cdn/llaveros.jpg"));
        assert!(failed.metadata["delivery_error"].is_string());
        assert_eq!(failed.metadata["intent"], "product_inquiry");
        assert!(failed.wa_message_id.as_deref().unwrap().starts_with("ai_"));
    }

    #[test]
    fn test_synthetic_message_id_prefix() {
        assert!(synthetic_message_id(Sender::Ai).starts_with("ai_"));
        assert!(synthetic_message_id(Sender::Admin).starts_with("admin_"));
    }
}
