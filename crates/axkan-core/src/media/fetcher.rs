//! Turns an inbound message payload into storable content.
//!
//! Media is downloaded from the provider and re-hosted in object storage so
//! the stored URL outlives the provider's short-lived link. Voice notes are
//! additionally transcribed. No failure here aborts a turn: each one degrades
//! to placeholder content and is recorded in the message metadata.

use axkan_types::conversation::MessageKind;
use axkan_types::error::ProviderError;
use axkan_types::inbound::{InboundContent, MediaRef};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{ObjectStorage, SpeechToText};
use crate::channel::api::{DownloadedMedia, WhatsAppApi};

/// Stored content for a voice note that produced no transcript.
pub const UNTRANSCRIBED_AUDIO: &str = "[Nota de voz sin transcripción]";

/// An inbound message after media processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedInbound {
    pub kind: MessageKind,
    /// Text body, media caption, or audio transcript.
    pub content: String,
    /// Durable URL of re-hosted media.
    pub media_url: Option<String>,
    pub metadata: Value,
}

impl ProcessedInbound {
    /// Image URL to show the model, for images that were re-hosted.
    pub fn model_image_url(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Image => self.media_url.as_deref(),
            _ => None,
        }
    }
}

/// Downloads, re-hosts, and transcribes inbound media.
pub struct MediaFetcher<'a, A, S, T> {
    api: &'a A,
    storage: &'a S,
    speech: &'a T,
}

impl<'a, A: WhatsAppApi, S: ObjectStorage, T: SpeechToText> MediaFetcher<'a, A, S, T> {
    pub fn new(api: &'a A, storage: &'a S, speech: &'a T) -> Self {
        Self {
            api,
            storage,
            speech,
        }
    }

    pub async fn process(&self, content: &InboundContent) -> ProcessedInbound {
        let kind = content.kind();
        let caption = content.caption().unwrap_or_default().to_string();
        let mut metadata = Map::new();

        match content {
            InboundContent::Text { body } => ProcessedInbound {
                kind,
                content: body.clone(),
                media_url: None,
                metadata: Value::Object(metadata),
            },
            InboundContent::Image { media, .. }
            | InboundContent::Video { media, .. }
            | InboundContent::Sticker { media } => {
                let media_url = self.rehost(media, &mut metadata).await;
                ProcessedInbound {
                    kind,
                    content: caption,
                    media_url,
                    metadata: Value::Object(metadata),
                }
            }
            InboundContent::Document {
                media, filename, ..
            } => {
                if let Some(name) = filename {
                    metadata.insert("filename".into(), json!(name));
                }
                let media_url = self.rehost(media, &mut metadata).await;
                ProcessedInbound {
                    kind,
                    content: caption,
                    media_url,
                    metadata: Value::Object(metadata),
                }
            }
            InboundContent::Audio { media } => self.process_audio(media, metadata).await,
        }
    }

    async fn process_audio(&self, media: &MediaRef, mut metadata: Map<String, Value>) -> ProcessedInbound {
        let downloaded = match self.download(media, &mut metadata).await {
            Some(d) => d,
            None => {
                return ProcessedInbound {
                    kind: MessageKind::Audio,
                    content: UNTRANSCRIBED_AUDIO.to_string(),
                    media_url: None,
                    metadata: Value::Object(metadata),
                };
            }
        };

        let media_url = self.upload(&downloaded, &mut metadata).await;

        let transcript = match self
            .speech
            .transcribe(&downloaded.bytes, &downloaded.mime_type)
            .await
        {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(media_id = %media.media_id, error = %e, "transcription unavailable");
                metadata.insert("transcription_error".into(), json!(e.to_string()));
                None
            }
        };
        metadata.insert("transcribed".into(), json!(transcript.is_some()));

        ProcessedInbound {
            kind: MessageKind::Audio,
            content: transcript.unwrap_or_else(|| UNTRANSCRIBED_AUDIO.to_string()),
            media_url,
            metadata: Value::Object(metadata),
        }
    }

    async fn rehost(&self, media: &MediaRef, metadata: &mut Map<String, Value>) -> Option<String> {
        let downloaded = self.download(media, metadata).await?;
        self.upload(&downloaded, metadata).await
    }

    async fn download(
        &self,
        media: &MediaRef,
        metadata: &mut Map<String, Value>,
    ) -> Option<DownloadedMedia> {
        match self.api.download_media(&media.media_id).await {
            Ok(downloaded) => {
                debug!(
                    media_id = %media.media_id,
                    bytes = downloaded.bytes.len(),
                    mime_type = %downloaded.mime_type,
                    "downloaded media"
                );
                metadata.insert("mime_type".into(), json!(downloaded.mime_type));
                Some(downloaded)
            }
            Err(e) => {
                record_failure(metadata, "download", &media.media_id, &e);
                if let Some(mime) = &media.mime_type {
                    metadata.insert("mime_type".into(), json!(mime));
                }
                None
            }
        }
    }

    async fn upload(
        &self,
        downloaded: &DownloadedMedia,
        metadata: &mut Map<String, Value>,
    ) -> Option<String> {
        match self
            .storage
            .upload(&downloaded.bytes, &downloaded.mime_type)
            .await
        {
            Ok(stored) => {
                metadata.insert("storage_id".into(), json!(stored.public_id));
                Some(stored.url)
            }
            Err(e) => {
                record_failure(metadata, "upload", &downloaded.mime_type, &e);
                None
            }
        }
    }
}

fn record_failure(metadata: &mut Map<String, Value>, stage: &str, subject: &str, e: &ProviderError) {
    warn!(stage, subject, error = %e, "media processing failed, continuing with placeholder");
    metadata.insert("media_error".into(), json!(format!("{stage}: {e}")));
}
