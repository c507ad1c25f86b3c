//! Inbound media handling: durable re-hosting and audio transcription.

pub mod fetcher;

use axkan_types::error::ProviderError;

/// A file stored in durable object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Public HTTPS URL.
    pub url: String,
    pub public_id: String,
}

/// Durable object storage for re-hosting provider media.
pub trait ObjectStorage: Send + Sync {
    fn upload(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> impl std::future::Future<Output = Result<StoredObject, ProviderError>> + Send;
}

/// Speech recognition for voice notes.
pub trait SpeechToText: Send + Sync {
    /// Returns `Ok(None)` when the audio held no recognizable speech.
    fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;
}
