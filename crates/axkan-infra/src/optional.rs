//! Adapters that may be left unconfigured.
//!
//! A deployment can run without speech recognition, media storage, or even a
//! model key. [`Optional`] wraps such an adapter: while absent every call
//! fails with [`ProviderError::NotConfigured`] (or [`LlmError::Provider`]),
//! which the turn pipeline already degrades around.

use axkan_core::channel::api::{DownloadedMedia, WhatsAppApi};
use axkan_core::llm::provider::LlmProvider;
use axkan_core::media::{ObjectStorage, SpeechToText, StoredObject};
use axkan_types::error::ProviderError;
use axkan_types::llm::{CompletionRequest, CompletionResponse, LlmError};
use tracing::info;

pub struct Optional<T> {
    inner: Option<T>,
    setting: &'static str,
}

impl<T> Optional<T> {
    /// Wrap the outcome of building an adapter. A construction failure is
    /// logged once and the adapter stays absent.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>, setting: &'static str) -> Self {
        match result {
            Ok(inner) => Self::present(inner, setting),
            Err(e) => {
                info!(setting, error = %e, "adapter disabled");
                Self::absent(setting)
            }
        }
    }

    pub fn present(inner: T, setting: &'static str) -> Self {
        Self {
            inner: Some(inner),
            setting,
        }
    }

    pub fn absent(setting: &'static str) -> Self {
        Self {
            inner: None,
            setting,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    fn get(&self) -> Result<&T, ProviderError> {
        self.inner
            .as_ref()
            .ok_or(ProviderError::NotConfigured(self.setting))
    }
}

impl<T: WhatsAppApi> WhatsAppApi for Optional<T> {
    async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>, ProviderError> {
        self.get()?.send_text(to, body).await
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.get()?.send_image(to, url, caption).await
    }

    async fn send_document(
        &self,
        to: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        self.get()?.send_document(to, url, filename, caption).await
    }

    async fn send_audio(&self, to: &str, url: &str) -> Result<Option<String>, ProviderError> {
        self.get()?.send_audio(to, url).await
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ProviderError> {
        self.get()?.download_media(media_id).await
    }
}

impl<T: ObjectStorage> ObjectStorage for Optional<T> {
    async fn upload(&self, bytes: &[u8], mime_type: &str) -> Result<StoredObject, ProviderError> {
        self.get()?.upload(bytes, mime_type).await
    }
}

impl<T: SpeechToText> SpeechToText for Optional<T> {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Option<String>, ProviderError> {
        self.get()?.transcribe(audio, mime_type).await
    }
}

impl<T: LlmProvider> LlmProvider for Optional<T> {
    fn name(&self) -> &str {
        self.inner.as_ref().map_or("unconfigured", |llm| llm.name())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match &self.inner {
            Some(llm) => llm.complete(request).await,
            None => Err(LlmError::Provider {
                message: format!("{} is not configured", self.setting),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::GoogleSpeech;
    use axkan_types::config::SpeechConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_absent_adapter_reports_setting() {
        let speech = Optional::from_result(
            GoogleSpeech::new(&SpeechConfig::default(), Duration::from_secs(5)),
            "GOOGLE_SPEECH_API_KEY",
        );
        assert!(!speech.is_configured());

        let err = speech.transcribe(b"OggS", "audio/ogg").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured("GOOGLE_SPEECH_API_KEY")));
    }

    #[tokio::test]
    async fn test_absent_llm_fails_with_provider_error() {
        let llm: Optional<crate::llm::anthropic::AnthropicProvider> = Optional::absent("ANTHROPIC_API_KEY");
        assert_eq!(llm.name(), "unconfigured");

        let request = CompletionRequest {
            model: "claude-sonnet-4-5-20250929".into(),
            messages: Vec::new(),
            system: None,
            max_tokens: 10,
            temperature: None,
        };
        let err = llm.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
