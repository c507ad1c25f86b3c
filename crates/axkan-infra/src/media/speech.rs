//! Google Cloud Speech-to-Text over the REST `speech:recognize` endpoint.

use std::time::Duration;

use axkan_core::media::SpeechToText;
use axkan_types::config::SpeechConfig;
use axkan_types::error::ProviderError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{build_client, check_status, transport_error};

pub struct GoogleSpeech {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    sample_rate_hertz: u32,
    api_key: SecretString,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl GoogleSpeech {
    pub fn new(config: &SpeechConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ProviderError::NotConfigured("GOOGLE_SPEECH_API_KEY"))?;

        Ok(Self {
            client: build_client(timeout).map_err(transport_error)?,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            sample_rate_hertz: config.sample_rate_hertz,
            api_key,
        })
    }

    fn request_body(&self, audio: &[u8], mime_type: &str) -> Value {
        let mut config = json!({
            "languageCode": self.language,
            "enableAutomaticPunctuation": true,
        });
        // WhatsApp voice notes are Opus in an Ogg container.
        if let Some(encoding) = encoding_for(mime_type) {
            config["encoding"] = json!(encoding);
            config["sampleRateHertz"] = json!(self.sample_rate_hertz);
        }
        json!({
            "config": config,
            "audio": { "content": STANDARD.encode(audio) },
        })
    }
}

fn encoding_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/ogg" | "audio/opus" => Some("OGG_OPUS"),
        "audio/amr" => Some("AMR"),
        _ => None,
    }
}

/// Best alternative of every result, joined with spaces.
fn best_transcript(response: RecognizeResponse) -> Option<String> {
    let text = response
        .results
        .into_iter()
        .filter_map(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

impl SpeechToText for GoogleSpeech {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&self.request_body(audio, mime_type))
            .send()
            .await
            .map_err(transport_error)?;

        let body: RecognizeResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("recognize response: {e}")))?;

        Ok(best_transcript(body))
    }
}
