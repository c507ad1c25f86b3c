//! The inbound turn: everything that happens after a delivery is acknowledged.
//!
//! Resolve the thread (dropping duplicates), process media, store the inbound
//! message, build the context, call the model, parse the reply, execute any
//! order, send the reply, and cache the turn's insight on the conversation.
//! Only repository failures before the inbound message is stored abort a
//! turn; every later stage degrades and the turn still answers.

use axkan_types::catalog::CatalogItem;
use axkan_types::conversation::{Conversation, Direction, Message, Sender};
use axkan_types::error::{OrderError, RepositoryError};
use axkan_types::inbound::InboundEnvelope;
use axkan_types::order::OrderReceipt;
use serde_json::{Value, json};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::agent::dispatcher::{AiDispatcher, FALLBACK_REPLY};
use crate::agent::intent::Intent;
use crate::agent::parser::parse_reply;
use crate::agent::prompt::SystemPromptBuilder;
use crate::catalog::CatalogProvider;
use crate::channel::api::WhatsAppApi;
use crate::conversation::context::{build_context, inbound_turn};
use crate::conversation::resolver::{Resolution, ThreadResolver};
use crate::llm::provider::LlmProvider;
use crate::media::fetcher::{MediaFetcher, ProcessedInbound};
use crate::media::{ObjectStorage, SpeechToText};
use crate::order::executor::{ORDER_FAILURE_REPLY, OrderExecutor};
use crate::outbound::{DeliveryReport, OutboundDispatcher, OutboundImage, OutboundReply, resolve_images};
use crate::repository::conversation::ConversationRepository;
use crate::repository::order::{OrderSink, OrderStore};

/// The collaborators a turn needs, bundled so the processor has one type
/// parameter. The server wires live adapters; tests wire fakes.
pub trait TurnPorts: Send + Sync + 'static {
    type Repo: ConversationRepository;
    type Api: WhatsAppApi;
    type Storage: ObjectStorage;
    type Speech: SpeechToText;
    type Llm: LlmProvider;
    type Catalog: CatalogProvider;
    type Orders: OrderStore;
    type Sink: OrderSink;

    fn repo(&self) -> &Self::Repo;
    fn api(&self) -> &Self::Api;
    fn storage(&self) -> &Self::Storage;
    fn speech(&self) -> &Self::Speech;
    fn llm(&self) -> &Self::Llm;
    fn catalog(&self) -> &Self::Catalog;
    fn orders(&self) -> &Self::Orders;
    fn sink(&self) -> &Self::Sink;
}

/// Tuning for a turn.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub max_tokens: u32,
    pub history_limit: u32,
    pub phone_suffix_digits: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 300,
            history_limit: 20,
            phone_suffix_digits: 10,
        }
    }
}

/// Errors that abort a turn before it was answered.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The message id was already stored; nothing was sent.
    Duplicate,
    Replied(TurnSummary),
}

#[derive(Debug)]
pub struct TurnSummary {
    pub conversation_id: Uuid,
    pub intent: Intent,
    pub order: Option<OrderReceipt>,
    pub delivery: DeliveryReport,
}

/// What to answer, decided from the model reply and the order outcome.
struct Answer {
    text: String,
    images: Vec<OutboundImage>,
    intent: Intent,
    order: Option<OrderReceipt>,
}

/// Runs inbound turns against a set of ports.
pub struct TurnProcessor<P: TurnPorts> {
    ports: P,
    settings: TurnSettings,
    prompt: SystemPromptBuilder,
}

impl<P: TurnPorts> TurnProcessor<P> {
    pub fn new(ports: P, settings: TurnSettings) -> Self {
        Self {
            ports,
            settings,
            prompt: SystemPromptBuilder::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: SystemPromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub async fn process(&self, envelope: InboundEnvelope) -> Result<TurnOutcome, TurnError> {
        let span = info_span!(
            "turn",
            wa_message_id = %envelope.wa_message_id,
            from = %envelope.from,
            kind = %envelope.content.kind(),
        );
        self.process_inner(envelope).instrument(span).await
    }

    async fn process_inner(&self, envelope: InboundEnvelope) -> Result<TurnOutcome, TurnError> {
        let repo = self.ports.repo();

        let resolver = ThreadResolver::new(repo, self.settings.phone_suffix_digits);
        let conversation = match resolver.resolve(&envelope).await? {
            Resolution::Duplicate => return Ok(TurnOutcome::Duplicate),
            Resolution::Thread(conversation) => conversation,
        };

        let fetcher = MediaFetcher::new(self.ports.api(), self.ports.storage(), self.ports.speech());
        let inbound = fetcher.process(&envelope.content).await;

        let message = inbound_message(&conversation, &envelope, &inbound);
        if !repo.insert_message(&message).await? {
            debug!("lost the insert race to a concurrent delivery");
            return Ok(TurnOutcome::Duplicate);
        }
        if let Err(e) = repo.increment_unread(&conversation.id).await {
            warn!(conversation_id = %conversation.id, error = %e, "failed to bump unread counter");
        }

        let history = self.load_history(&conversation, &message.id).await;
        let catalog = self.load_catalog().await;

        let system = self.prompt.build(&catalog);
        let context = build_context(&history, inbound_turn(&inbound));
        let reply = AiDispatcher::new(self.ports.llm(), &self.settings.model, self.settings.max_tokens)
            .dispatch(system, context)
            .await;

        let answer = if reply.fallback {
            Answer {
                text: FALLBACK_REPLY.to_string(),
                images: Vec::new(),
                intent: Intent::Error,
                order: None,
            }
        } else {
            self.answer_from_model(&reply.text, &conversation, &catalog).await
        };

        let mut metadata = json!({ "intent": answer.intent });
        if let Some(receipt) = &answer.order {
            metadata["order_number"] = json!(receipt.order_number);
        }
        let outbound = OutboundReply {
            text: Some(answer.text),
            images: answer.images,
            metadata,
        };
        let delivery = OutboundDispatcher::new(self.ports.api(), repo)
            .deliver(&conversation, Sender::Ai, &outbound)
            .await;

        let summary = answer.order.as_ref().map(|r| {
            format!("Pedido {} por ${:.2} MXN", r.order_number, r.total_price)
        });
        if let Err(e) = repo
            .update_insight(&conversation.id, answer.intent.as_str(), summary.as_deref())
            .await
        {
            warn!(conversation_id = %conversation.id, error = %e, "failed to cache turn insight");
        }

        info!(
            conversation_id = %conversation.id,
            intent = %answer.intent,
            images = delivery.images_delivered,
            order = answer.order.is_some(),
            "turn answered"
        );

        Ok(TurnOutcome::Replied(TurnSummary {
            conversation_id: conversation.id,
            intent: answer.intent,
            order: answer.order,
            delivery,
        }))
    }

    async fn answer_from_model(
        &self,
        raw: &str,
        conversation: &Conversation,
        catalog: &[CatalogItem],
    ) -> Answer {
        let parsed = parse_reply(raw);
        let mut order = None;

        if parsed.order_rejected {
            warn!(conversation_id = %conversation.id, "order directive could not be parsed, asking the client to confirm again");
            return Answer {
                text: ORDER_FAILURE_REPLY.to_string(),
                images: Vec::new(),
                intent: Intent::OrderCreation,
                order: None,
            };
        }

        if let Some(intent) = &parsed.order {
            let executor = OrderExecutor::new(self.ports.orders(), self.ports.sink());
            match executor.execute(intent, &conversation.wa_id, catalog).await {
                Ok(receipt) => order = Some(receipt),
                Err(e) => {
                    match &e {
                        OrderError::Validation(_) => {
                            warn!(conversation_id = %conversation.id, error = %e, "order directive rejected")
                        }
                        OrderError::Persistence(_) | OrderError::Sink(_) => {
                            tracing::error!(conversation_id = %conversation.id, error = %e, "order creation failed")
                        }
                    }
                    return Answer {
                        text: ORDER_FAILURE_REPLY.to_string(),
                        images: Vec::new(),
                        intent: Intent::OrderCreation,
                        order: None,
                    };
                }
            }
        }

        let images: Vec<OutboundImage> = resolve_images(&parsed.image_requests, catalog)
            .into_iter()
            .map(OutboundImage::from)
            .collect();

        let text = if parsed.text.is_empty() && images.is_empty() {
            match &order {
                Some(receipt) => format!(
                    "Listo! Tu pedido {} quedó registrado. Gracias por tu compra.",
                    receipt.order_number
                ),
                None => FALLBACK_REPLY.to_string(),
            }
        } else {
            parsed.text
        };

        Answer {
            text,
            images,
            intent: parsed.intent,
            order,
        }
    }

    /// The last `history_limit` messages before the current one.
    async fn load_history(&self, conversation: &Conversation, current: &Uuid) -> Vec<Message> {
        let limit = self.settings.history_limit;
        match self
            .ports
            .repo()
            .recent_messages(&conversation.id, limit.saturating_add(1))
            .await
        {
            Ok(mut messages) => {
                messages.retain(|m| m.id != *current);
                let start = messages.len().saturating_sub(limit as usize);
                messages.split_off(start)
            }
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "history unavailable, answering without it");
                Vec::new()
            }
        }
    }

    async fn load_catalog(&self) -> Vec<CatalogItem> {
        match self.ports.catalog().list_products().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "catalog unavailable, answering without it");
                Vec::new()
            }
        }
    }
}

fn inbound_message(
    conversation: &Conversation,
    envelope: &InboundEnvelope,
    inbound: &ProcessedInbound,
) -> Message {
    let mut metadata = match &inbound.metadata {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Some(ts) = envelope.timestamp {
        metadata.insert("provider_timestamp".into(), json!(ts.to_rfc3339()));
    }

    Message::new(
        conversation.id,
        Some(envelope.wa_message_id.clone()),
        Direction::Inbound,
        Sender::Client,
        inbound.kind,
        inbound.content.clone(),
    )
    .with_media_url(inbound.media_url.clone())
    .with_metadata(Value::Object(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use axkan_types::conversation::{Client, MessageKind};
    use axkan_types::inbound::{InboundContent, MediaRef};
    use axkan_types::order::PHONE_PLACEHOLDER;

    struct TestPorts {
        repo: MemoryRepo,
        api: RecordingApi,
        storage: FakeStorage,
        speech: UnavailableSpeech,
        llm: ScriptedLlm,
        catalog: FixedCatalog,
        orders: MemoryOrders,
        sink: FakeSink,
    }

    impl TurnPorts for TestPorts {
        type Repo = MemoryRepo;
        type Api = RecordingApi;
        type Storage = FakeStorage;
        type Speech = UnavailableSpeech;
        type Llm = ScriptedLlm;
        type Catalog = FixedCatalog;
        type Orders = MemoryOrders;
        type Sink = FakeSink;

        fn repo(&self) -> &MemoryRepo {
            &self.repo
        }
        fn api(&self) -> &RecordingApi {
            &self.api
        }
        fn storage(&self) -> &FakeStorage {
            &self.storage
        }
        fn speech(&self) -> &UnavailableSpeech {
            &self.speech
        }
        fn llm(&self) -> &ScriptedLlm {
            &self.llm
        }
        fn catalog(&self) -> &FixedCatalog {
            &self.catalog
        }
        fn orders(&self) -> &MemoryOrders {
            &self.orders
        }
        fn sink(&self) -> &FakeSink {
            &self.sink
        }
    }

    fn processor(llm: ScriptedLlm) -> TurnProcessor<TestPorts> {
        processor_with(llm, true)
    }

    fn processor_with(llm: ScriptedLlm, sink_healthy: bool) -> TurnProcessor<TestPorts> {
        processor_with_api(llm, sink_healthy, RecordingApi::default())
    }

    fn processor_with_api(
        llm: ScriptedLlm,
        sink_healthy: bool,
        api: RecordingApi,
    ) -> TurnProcessor<TestPorts> {
        let ports = TestPorts {
            repo: MemoryRepo::default(),
            api,
            storage: FakeStorage,
            speech: UnavailableSpeech,
            llm,
            catalog: FixedCatalog(vec![
                product("Imanes", 11.0, 2.5, Some("https://cdn.test/imanes.jpg")),
                product("Llaveros", 9.5, 2.0, None),
            ]),
            orders: MemoryOrders::default(),
            sink: FakeSink {
                healthy: sink_healthy,
            },
        };
        TurnProcessor::new(ports, TurnSettings::default())
    }

    fn text_envelope(id: &str, from: &str, body: &str) -> InboundEnvelope {
        InboundEnvelope {
            wa_message_id: id.to_string(),
            from: from.to_string(),
            display_name: Some("Ana".to_string()),
            timestamp: None,
            content: InboundContent::Text { body: body.to_string() },
        }
    }

    fn order_reply() -> String {
        format!(
            "[CREATE_ORDER]{{\"clientName\":\"Ana López\",\"clientPhone\":\"{PHONE_PLACEHOLDER}\",\"items\":[{{\"productName\":\"Imanes\",\"quantity\":100,\"unitPrice\":11.0}}],\"eventType\":\"Boda\",\"deliveryDate\":\"2026-03-20\"}}[/CREATE_ORDER]\nListo Ana! Tu pedido de 100 imanes para tu boda quedó registrado."
        )
    }

    fn sent_texts(api: &RecordingApi) -> Vec<String> {
        api.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { body, .. } => Some(body),
                Sent::Image { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_order_from_unseen_thread() {
        let processor = processor(ScriptedLlm::replying(order_reply()));
        let outcome = processor
            .process(text_envelope(
                "wamid.1",
                "5215512345678",
                "Quiero 100 imanes para mi boda el 20 de marzo",
            ))
            .await
            .unwrap();

        let TurnOutcome::Replied(summary) = outcome else {
            panic!("expected a reply");
        };
        let ports = processor.ports();

        let conversations = ports.repo.conversations();
        assert_eq!(conversations.len(), 1);
        assert!(conversations[0].client_id.is_none());
        assert_eq!(conversations[0].unread_count, 1);
        assert_eq!(conversations[0].intent.as_deref(), Some("order_creation"));

        let orders = ports.orders.orders.lock().unwrap().clone();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].items.len(), 1);
        assert_eq!(orders[0].items[0].product_name, "Imanes");
        assert_eq!(orders[0].items[0].quantity, 100);
        assert_eq!(orders[0].total_price, 100.0 * 11.0);
        assert_eq!(orders[0].production_cost, 100.0 * 2.5);
        assert_eq!(orders[0].client_phone, "5215512345678");
        assert_eq!(summary.intent, Intent::OrderCreation);
        assert!(summary.order.is_some());

        let outbound: Vec<Message> = ports
            .repo
            .messages()
            .into_iter()
            .filter(|m| m.direction == Direction::Outbound)
            .collect();
        assert_eq!(outbound.len(), 1);
        assert_eq!(
            outbound[0].content,
            "Listo Ana! Tu pedido de 100 imanes para tu boda quedó registrado."
        );
        assert!(!outbound[0].content.contains("CREATE_ORDER"));
        assert_eq!(outbound[0].sender, Sender::Ai);
        assert_eq!(outbound[0].metadata["intent"], "order_creation");
        assert_eq!(sent_texts(&ports.api), vec![outbound[0].content.clone()]);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_noop() {
        let processor = processor(ScriptedLlm::replying("Hola! Bienvenido a AXKAN."));
        let envelope = text_envelope("wamid.dup", "5215512345678", "hola");

        let first = processor.process(envelope.clone()).await.unwrap();
        let second = processor.process(envelope).await.unwrap();

        assert!(matches!(first, TurnOutcome::Replied(_)));
        assert!(matches!(second, TurnOutcome::Duplicate));

        let inbound = processor
            .ports()
            .repo
            .messages()
            .into_iter()
            .filter(|m| m.wa_message_id.as_deref() == Some("wamid.dup"))
            .count();
        assert_eq!(inbound, 1);
        assert_eq!(processor.ports().api.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_audio_without_transcription_still_answers() {
        let processor = processor(ScriptedLlm::replying("Me puedes escribir tu mensaje?"));
        let envelope = InboundEnvelope {
            content: InboundContent::Audio {
                media: MediaRef {
                    media_id: "audio1".into(),
                    mime_type: Some("audio/ogg; codecs=opus".into()),
                },
            },
            ..text_envelope("wamid.audio", "5215512345678", "")
        };

        let outcome = processor.process(envelope).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Replied(_)));

        let messages = processor.ports().repo.messages();
        let inbound = messages
            .iter()
            .find(|m| m.direction == Direction::Inbound)
            .unwrap();
        assert_eq!(inbound.kind, MessageKind::Audio);
        assert_eq!(inbound.media_url.as_deref(), Some("https://cdn.test/audio1"));

        let texts = sent_texts(&processor.ports().api);
        assert_eq!(texts.len(), 1);
        assert!(!texts[0].is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_sends_fallback() {
        let processor = processor(ScriptedLlm::failing());
        let outcome = processor
            .process(text_envelope("wamid.2", "5215512345678", "hola"))
            .await
            .unwrap();

        let TurnOutcome::Replied(summary) = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(summary.intent, Intent::Error);
        assert_eq!(sent_texts(&processor.ports().api), vec![FALLBACK_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_sink_failure_tells_client_and_stores_nothing() {
        let processor = processor_with(ScriptedLlm::replying(order_reply()), false);
        processor
            .process(text_envelope("wamid.3", "5215512345678", "sí, confirmo"))
            .await
            .unwrap();

        assert!(processor.ports().orders.orders.lock().unwrap().is_empty());
        assert_eq!(
            sent_texts(&processor.ports().api),
            vec![ORDER_FAILURE_REPLY.to_string()]
        );
    }

    #[tokio::test]
    async fn test_media_download_failure_still_answers() {
        let api = RecordingApi {
            fail_downloads: true,
            ..Default::default()
        };
        let processor = processor_with_api(ScriptedLlm::replying("Qué bonita foto!"), true, api);
        let envelope = InboundEnvelope {
            wa_message_id: "wamid.8".into(),
            from: "5215512345678".into(),
            display_name: Some("Ana".into()),
            timestamp: None,
            content: InboundContent::Image {
                media: MediaRef {
                    media_id: "media-1".into(),
                    mime_type: Some("image/jpeg".into()),
                },
                caption: Some("así los quiero".into()),
            },
        };

        let outcome = processor.process(envelope).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Replied(_)));

        let stored = processor.ports().repo.messages();
        let inbound = &stored[0];
        assert_eq!(inbound.kind, MessageKind::Image);
        assert_eq!(inbound.content, "así los quiero");
        assert!(inbound.media_url.is_none());
        assert!(
            inbound.metadata["media_error"]
                .as_str()
                .is_some_and(|e| e.starts_with("download"))
        );
        assert_eq!(sent_texts(&processor.ports().api), vec!["Qué bonita foto!".to_string()]);
    }

    #[tokio::test]
    async fn test_unparseable_order_asks_for_confirmation() {
        let processor = processor(ScriptedLlm::replying(
            "[CREATE_ORDER]{\"clientName\":\"Ana\",\"items\":[{\"productName\":\"Imanes\",\"quantity\":\"cien\"}]}[/CREATE_ORDER]Listo Ana! Tu pedido quedó registrado.",
        ));
        let outcome = processor
            .process(text_envelope("wamid.7", "5215512345678", "sí, confirmo"))
            .await
            .unwrap();

        let TurnOutcome::Replied(summary) = outcome else {
            panic!("expected a reply");
        };
        assert!(summary.order.is_none());
        assert!(processor.ports().orders.orders.lock().unwrap().is_empty());
        assert_eq!(
            sent_texts(&processor.ports().api),
            vec![ORDER_FAILURE_REPLY.to_string()]
        );
    }

    #[tokio::test]
    async fn test_image_directive_sends_catalog_photo() {
        let processor = processor(ScriptedLlm::replying(
            "Claro, mira! [SEND_IMAGE]Imanes[/SEND_IMAGE][SEND_IMAGE]Tazas[/SEND_IMAGE]",
        ));
        let outcome = processor
            .process(text_envelope("wamid.4", "5215512345678", "tienes fotos?"))
            .await
            .unwrap();

        let TurnOutcome::Replied(summary) = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(summary.delivery.images_delivered, 1);
        let sent = processor.ports().api.sent();
        assert_eq!(
            sent[1],
            Sent::Image {
                to: "5215512345678".into(),
                url: "https://cdn.test/imanes.jpg".into(),
                caption: Some("Imanes".into()),
            }
        );
        let images: Vec<Message> = processor
            .ports()
            .repo
            .messages()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Image)
            .collect();
        assert_eq!(images.len(), 1);
        assert!(images[0].wa_message_id.as_deref().unwrap().starts_with("ai_"));
    }

    #[tokio::test]
    async fn test_links_client_by_phone_suffix_and_keeps_history() {
        let processor = processor(ScriptedLlm::replying("Tenemos imanes y llaveros."));
        processor.ports().repo.clients.lock().unwrap().extend([
            Client {
                id: 7,
                name: "Ana López".into(),
                phone: Some("55 1234 5678".into()),
            },
            Client {
                id: 3,
                name: "Ana L.".into(),
                phone: Some("+52 5512345678".into()),
            },
        ]);

        processor
            .process(text_envelope("wamid.5", "5215512345678", "hola"))
            .await
            .unwrap();
        processor
            .process(text_envelope("wamid.6", "5215512345678", "qué precios tienen?"))
            .await
            .unwrap();

        let conversations = processor.ports().repo.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].client_id, Some(3));
        assert_eq!(conversations[0].unread_count, 2);

        // The second call sees the first exchange plus the new message, once.
        let requests = processor.ports().llm.requests.lock().unwrap().clone();
        let turns = &requests[1].messages;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].joined_text(), "hola");
        assert_eq!(turns[2].joined_text(), "qué precios tienen?");
    }
}
