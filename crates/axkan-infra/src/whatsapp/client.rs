//! WhatsApp Cloud API client -- concrete [`WhatsAppApi`] implementation.
//!
//! Every call carries the configured bearer token. Non-success statuses are
//! classified through [`ProviderError::from_status`], so a 401/403 surfaces
//! as [`ProviderError::Auth`] for the token health monitor to observe.
//!
//! The access token is wrapped in [`SecretString`] and is only exposed when
//! building the `Authorization` header.

use std::time::Duration;

use axkan_core::channel::api::{DownloadedMedia, WhatsAppApi};
use axkan_types::config::WhatsAppConfig;
use axkan_types::error::ProviderError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};

/// Graph API client bound to one business phone number.
pub struct WhatsAppClient {
    client: reqwest::Client,
    api_base: String,
    phone_number_id: String,
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    mime_type: Option<String>,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or(ProviderError::NotConfigured("WHATSAPP_ACCESS_TOKEN"))?;
        let client = build_client(timeout).map_err(transport_error)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            access_token,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }

    async fn send(&self, payload: Value) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("send response: {e}")))?;
        let id = body.messages.into_iter().next().map(|m| m.id);
        debug!(message_id = ?id, "whatsapp send accepted");
        Ok(id)
    }

    /// Read the phone number object, which only succeeds with a live token.
    pub async fn check_token(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_base, self.phone_number_id))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

/// Request body for an outbound message of `kind` with its type object.
fn message_payload(to: &str, kind: &str, object: Value) -> Value {
    let mut payload = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": kind,
    });
    payload[kind] = object;
    payload
}

fn with_caption(mut object: Value, caption: Option<&str>) -> Value {
    if let Some(caption) = caption.filter(|c| !c.is_empty()) {
        object["caption"] = json!(caption);
    }
    object
}

impl WhatsAppApi for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>, ProviderError> {
        self.send(message_payload(to, "text", json!({ "body": body })))
            .await
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let image = with_caption(json!({ "link": url }), caption);
        self.send(message_payload(to, "image", image)).await
    }

    async fn send_document(
        &self,
        to: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>, ProviderError> {
        let document = with_caption(json!({ "link": url, "filename": filename }), caption);
        self.send(message_payload(to, "document", document)).await
    }

    async fn send_audio(&self, to: &str, url: &str) -> Result<Option<String>, ProviderError> {
        self.send(message_payload(to, "audio", json!({ "link": url })))
            .await
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ProviderError> {
        // Step 1: resolve the id to a short-lived CDN URL.
        let response = self
            .client
            .get(format!("{}/{media_id}", self.api_base))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        let metadata: MediaMetadata = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("media metadata: {e}")))?;

        // Step 2: the CDN also requires the bearer token.
        let response = self
            .client
            .get(&metadata.url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(transport_error)?;

        Ok(DownloadedMedia {
            bytes: bytes.to_vec(),
            mime_type: metadata
                .mime_type
                .or(header_mime)
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        })
    }
}
