//! WhatsApp Cloud API trait definition.

use axkan_types::error::ProviderError;

/// Media bytes downloaded from the provider.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Outbound calls to the messaging provider.
///
/// Send methods return the provider-assigned message id, when the provider
/// returned one.
pub trait WhatsAppApi: Send + Sync {
    fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;

    fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;

    fn send_document(
        &self,
        to: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;

    fn send_audio(
        &self,
        to: &str,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, ProviderError>> + Send;

    /// Resolve a media id to its download URL and fetch the bytes.
    fn download_media(
        &self,
        media_id: &str,
    ) -> impl std::future::Future<Output = Result<DownloadedMedia, ProviderError>> + Send;
}
