//! Decorator that routes every provider call through a [`TokenHealthMonitor`].

use std::sync::Arc;

use axkan_types::error::ProviderError;
use axkan_types::order::OrderDraft;

use super::api::{DownloadedMedia, WhatsAppApi};
use super::health::{Notifier, TokenHealthMonitor};
use crate::repository::order::OrderSink;

/// Wraps a provider client so the monitor observes the result of each call.
pub struct Monitored<T, N: Notifier> {
    inner: T,
    monitor: Arc<TokenHealthMonitor<N>>,
}

impl<T, N: Notifier> Monitored<T, N> {
    pub fn new(inner: T, monitor: Arc<TokenHealthMonitor<N>>) -> Self {
        Self { inner, monitor }
    }

    pub fn monitor(&self) -> &Arc<TokenHealthMonitor<N>> {
        &self.monitor
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: WhatsAppApi, N: Notifier> WhatsAppApi for Monitored<T, N> {
    async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>, ProviderError> {
        let result = self.inner.send_text(to, body).await;
        self.monitor.observe(&result).await;
        result
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let result = self.inner.send_image(to, url, caption).await;
        self.monitor.observe(&result).await;
        result
    }

    async fn send_document(
        &self,
        to: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let result = self.inner.send_document(to, url, filename, caption).await;
        self.monitor.observe(&result).await;
        result
    }

    async fn send_audio(&self, to: &str, url: &str) -> Result<Option<String>, ProviderError> {
        let result = self.inner.send_audio(to, url).await;
        self.monitor.observe(&result).await;
        result
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ProviderError> {
        let result = self.inner.download_media(media_id).await;
        self.monitor.observe(&result).await;
        result
    }
}

impl<T: OrderSink, N: Notifier> OrderSink for Monitored<T, N> {
    async fn submit(&self, draft: &OrderDraft) -> Result<String, ProviderError> {
        let result = self.inner.submit(draft).await;
        self.monitor.observe(&result).await;
        result
    }
}
