//! In-memory fakes of every port, shared by the pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axkan_types::catalog::CatalogItem;
use axkan_types::conversation::{Client, Conversation, ConversationSummary, Message};
use axkan_types::error::{OrderError, ProviderError, RepositoryError};
use axkan_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
use axkan_types::order::{OrderDraft, OrderReceipt};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::CatalogProvider;
use crate::channel::api::{DownloadedMedia, WhatsAppApi};
use crate::llm::provider::LlmProvider;
use crate::media::{ObjectStorage, SpeechToText, StoredObject};
use crate::repository::conversation::ConversationRepository;
use crate::repository::order::{OrderSink, OrderStore};

#[derive(Default)]
pub struct MemoryRepo {
    pub conversations: Mutex<Vec<Conversation>>,
    pub messages: Mutex<Vec<Message>>,
    pub clients: Mutex<Vec<Client>>,
}

impl MemoryRepo {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.lock().unwrap().clone()
    }
}

impl ConversationRepository for MemoryRepo {
    async fn upsert_conversation(
        &self,
        wa_id: &str,
        client_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(existing) = conversations.iter_mut().find(|c| c.wa_id == wa_id) {
            existing.client_name = Some(client_name.to_string());
            existing.last_message_at = existing.last_message_at.max(at);
            existing.updated_at = at;
            return Ok(existing.clone());
        }
        let conversation = Conversation {
            id: Uuid::now_v7(),
            wa_id: wa_id.to_string(),
            client_id: None,
            client_name: Some(client_name.to_string()),
            last_message_at: at,
            unread_count: 0,
            intent: None,
            ai_summary: None,
            insights: None,
            created_at: at,
            updated_at: at,
        };
        conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == *id)
            .cloned())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let messages = self.messages();
        let mut out: Vec<ConversationSummary> = self
            .conversations()
            .into_iter()
            .map(|conversation| {
                let own: Vec<&Message> = messages
                    .iter()
                    .filter(|m| m.conversation_id == conversation.id)
                    .collect();
                ConversationSummary {
                    last_message: own.last().map(|m| m.content.clone()),
                    message_count: own.len() as u32,
                    conversation,
                }
            })
            .collect();
        out.sort_by(|a, b| b.conversation.last_message_at.cmp(&a.conversation.last_message_at));
        Ok(out)
    }

    async fn link_client(&self, conversation_id: &Uuid, client_id: i64) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        match conversations.iter_mut().find(|c| c.id == *conversation_id) {
            Some(c) if c.client_id.is_none() => {
                c.client_id = Some(client_id);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn touch(&self, conversation_id: &Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(c) = self
            .conversations
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == *conversation_id)
        {
            c.last_message_at = c.last_message_at.max(at);
        }
        Ok(())
    }

    async fn increment_unread(&self, conversation_id: &Uuid) -> Result<(), RepositoryError> {
        if let Some(c) = self
            .conversations
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == *conversation_id)
        {
            c.unread_count += 1;
        }
        Ok(())
    }

    async fn mark_read(&self, conversation_id: &Uuid) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        match conversations.iter_mut().find(|c| c.id == *conversation_id) {
            Some(c) => {
                c.unread_count = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_insight(
        &self,
        conversation_id: &Uuid,
        intent: &str,
        summary: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if let Some(c) = self
            .conversations
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == *conversation_id)
        {
            c.intent = Some(intent.to_string());
            if let Some(summary) = summary {
                c.ai_summary = Some(summary.to_string());
            }
        }
        Ok(())
    }

    async fn message_exists(&self, wa_message_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.wa_message_id.as_deref() == Some(wa_message_id)))
    }

    async fn insert_message(&self, message: &Message) -> Result<bool, RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        if message.wa_message_id.is_some()
            && messages.iter().any(|m| m.wa_message_id == message.wa_message_id)
        {
            return Ok(false);
        }
        messages.push(message.clone());
        Ok(true)
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let own: Vec<Message> = self
            .messages()
            .into_iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .collect();
        let start = own.len().saturating_sub(limit as usize);
        Ok(own[start..].to_vec())
    }

    async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .messages()
            .into_iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .collect())
    }

    async fn find_client_by_phone_suffix(&self, digits: &str) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.lock().unwrap();
        let mut matches: Vec<&Client> = clients
            .iter()
            .filter(|c| c.phone.as_deref().is_some_and(|p| p.contains(digits)))
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches.first().map(|c| (*c).clone()))
    }
}

/// A recorded outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: String, body: String },
    Image { to: String, url: String, caption: Option<String> },
}

/// Records every send. Media downloads fail when `fail_downloads` is set, and
/// image sends to `failing_image_url` are recorded and then rejected.
#[derive(Default)]
pub struct RecordingApi {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_downloads: bool,
    pub failing_image_url: Option<String>,
    pub(crate) counter: AtomicUsize,
}

impl RecordingApi {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn next_id(&self) -> Option<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Some(format!("wamid.out{n}"))
    }
}

impl WhatsAppApi for RecordingApi {
    async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>, ProviderError> {
        self.sent.lock().unwrap().push(Sent::Text {
            to: to.into(),
            body: body.into(),
        });
        Ok(self.next_id())
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.sent.lock().unwrap().push(Sent::Image {
            to: to.into(),
            url: url.into(),
            caption: caption.map(str::to_string),
        });
        if self.failing_image_url.as_deref() == Some(url) {
            return Err(ProviderError::Rejected {
                status: 400,
                body: "media url not reachable".into(),
            });
        }
        Ok(None)
    }

    async fn send_document(
        &self,
        _to: &str,
        _url: &str,
        _filename: &str,
        _caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.next_id())
    }

    async fn send_audio(&self, _to: &str, _url: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.next_id())
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ProviderError> {
        if self.fail_downloads {
            return Err(ProviderError::Transient("download timed out".into()));
        }
        Ok(DownloadedMedia {
            bytes: media_id.as_bytes().to_vec(),
            mime_type: "audio/ogg; codecs=opus".into(),
        })
    }
}

pub struct FakeStorage;

impl ObjectStorage for FakeStorage {
    async fn upload(&self, bytes: &[u8], _mime_type: &str) -> Result<StoredObject, ProviderError> {
        let id = String::from_utf8_lossy(bytes).to_string();
        Ok(StoredObject {
            url: format!("https://cdn.test/{id}"),
            public_id: id,
        })
    }
}

/// Speech recognition that is never configured.
pub struct UnavailableSpeech;

impl SpeechToText for UnavailableSpeech {
    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<Option<String>, ProviderError> {
        Err(ProviderError::NotConfigured("speech-to-text"))
    }
}

/// A model that always answers with the same text, or always fails.
pub struct ScriptedLlm {
    pub reply: Option<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(text) => Ok(CompletionResponse {
                id: "msg_test".into(),
                content: text.clone(),
                model: request.model.clone(),
                stop_reason: Some("end_turn".into()),
                usage: Usage {
                    input_tokens: 100,
                    output_tokens: 20,
                },
            }),
            None => Err(LlmError::Timeout),
        }
    }
}

pub struct FixedCatalog(pub Vec<CatalogItem>);

impl CatalogProvider for FixedCatalog {
    async fn list_products(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct MemoryOrders {
    pub orders: Mutex<Vec<OrderDraft>>,
}

impl OrderStore for MemoryOrders {
    async fn create_order<S: OrderSink>(
        &self,
        draft: &OrderDraft,
        sink: &S,
    ) -> Result<OrderReceipt, OrderError> {
        let external_id = sink
            .submit(draft)
            .await
            .map_err(|e| OrderError::Sink(e.to_string()))?;
        self.orders.lock().unwrap().push(draft.clone());
        Ok(OrderReceipt {
            order_id: draft.id,
            order_number: draft.order_number.clone(),
            external_id,
            total_price: draft.total_price,
        })
    }
}

pub struct FakeSink {
    pub healthy: bool,
}

impl OrderSink for FakeSink {
    async fn submit(&self, draft: &OrderDraft) -> Result<String, ProviderError> {
        if self.healthy {
            Ok(format!("ext-{}", draft.order_number))
        } else {
            Err(ProviderError::Transient("order system unreachable".into()))
        }
    }
}

pub fn product(name: &str, price: f64, cost: f64, image_url: Option<&str>) -> CatalogItem {
    CatalogItem {
        name: name.into(),
        price,
        description: None,
        category: Some("Recuerdos".into()),
        cost,
        image_url: image_url.map(str::to_string),
    }
}
