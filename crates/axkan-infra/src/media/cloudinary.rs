//! Cloudinary object storage.
//!
//! Uploads go to `{api_base}/{cloud_name}/auto/upload` as signed multipart
//! requests, so any media type is accepted and stored under one folder.

use std::time::Duration;

use axkan_core::media::{ObjectStorage, StoredObject};
use axkan_types::config::StorageConfig;
use axkan_types::error::ProviderError;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::http::{build_client, check_status, transport_error};
use crate::whatsapp::signature::hex_encode;

pub struct CloudinaryStorage {
    client: reqwest::Client,
    upload_url: String,
    folder: String,
    api_key: SecretString,
    api_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

impl CloudinaryStorage {
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self, ProviderError> {
        if config.cloud_name.is_empty() {
            return Err(ProviderError::NotConfigured("CLOUDINARY_CLOUD_NAME"));
        }
        let api_key = config
            .api_key
            .clone()
            .ok_or(ProviderError::NotConfigured("CLOUDINARY_API_KEY"))?;
        let api_secret = config
            .api_secret
            .clone()
            .ok_or(ProviderError::NotConfigured("CLOUDINARY_API_SECRET"))?;

        Ok(Self {
            client: build_client(timeout).map_err(transport_error)?,
            upload_url: format!(
                "{}/{}/auto/upload",
                config.api_base.trim_end_matches('/'),
                config.cloud_name
            ),
            folder: config.folder.clone(),
            api_key,
            api_secret,
        })
    }
}

/// Signature over the sorted signed parameters followed by the secret.
fn upload_signature(folder: &str, timestamp: i64, secret: &str) -> String {
    let to_sign = format!("folder={folder}&timestamp={timestamp}{secret}");
    hex_encode(&Sha256::digest(to_sign.as_bytes()))
}

fn file_extension(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "video/mp4" => "mp4",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

impl ObjectStorage for CloudinaryStorage {
    async fn upload(&self, bytes: &[u8], mime_type: &str) -> Result<StoredObject, ProviderError> {
        let timestamp = Utc::now().timestamp();
        let signature = upload_signature(&self.folder, timestamp, self.api_secret.expose_secret());
        let essence = mime_type.split(';').next().unwrap_or_default().trim().to_string();

        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(format!("upload.{}", file_extension(mime_type)))
            .mime_str(&essence)
            .map_err(|e| ProviderError::Rejected {
                status: 0,
                body: format!("invalid mime type {essence}: {e}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.expose_secret().to_string())
            .text("timestamp", timestamp.to_string())
            .text("folder", self.folder.clone())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let uploaded: UploadResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("upload response: {e}")))?;

        Ok(StoredObject {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic_hex() {
        let a = upload_signature("whatsapp-media", 1_767_225_600, "secret");
        let b = upload_signature("whatsapp-media", 1_767_225_600, "secret");
        let c = upload_signature("whatsapp-media", 1_767_225_601, "secret");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_file_extension_ignores_parameters() {
        assert_eq!(file_extension("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(file_extension("image/jpeg"), "jpg");
        assert_eq!(file_extension("application/x-unknown"), "bin");
    }

    #[test]
    fn test_requires_credentials() {
        let config = StorageConfig {
            cloud_name: "axkan".into(),
            ..Default::default()
        };
        assert!(matches!(
            CloudinaryStorage::new(&config, Duration::from_secs(5)),
            Err(ProviderError::NotConfigured("CLOUDINARY_API_KEY"))
        ));
    }
}
