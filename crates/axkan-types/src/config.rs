//! Configuration types for Axkan.
//!
//! `AppConfig` mirrors `config.toml` in the data directory. Every field has a
//! default; secrets are normally supplied through the environment and
//! overlaid by the loader in axkan-infra.

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
    pub order_sink: OrderSinkConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP listener and operator API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Key required on operator routes. Operator routes reject every
    /// request while this is unset.
    pub admin_api_key: Option<SecretString>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            admin_api_key: None,
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub phone_number_id: String,
    pub access_token: Option<SecretString>,
    /// Shared secret for the webhook verification handshake.
    pub verify_token: Option<SecretString>,
    /// App secret used to check `X-Hub-Signature-256`. Signature checks are
    /// skipped while unset.
    pub app_secret: Option<SecretString>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v22.0".to_string(),
            phone_number_id: String::new(),
            access_token: None,
            verify_token: None,
            app_secret: None,
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: Option<SecretString>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 300,
            api_key: None,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub endpoint: String,
    /// Fixed recognition locale.
    pub language: String,
    pub sample_rate_hertz: u32,
    pub api_key: Option<SecretString>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://speech.googleapis.com/v1/speech:recognize".to_string(),
            language: "es-MX".to_string(),
            sample_rate_hertz: 16_000,
            api_key: None,
        }
    }
}

/// Durable object storage (Cloudinary) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub api_base: String,
    pub cloud_name: String,
    pub folder: String,
    pub api_key: Option<SecretString>,
    pub api_secret: Option<SecretString>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            cloud_name: String::new(),
            folder: "whatsapp-media".to_string(),
            api_key: None,
            api_secret: None,
        }
    }
}

/// Operator notification (email over HTTP) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub endpoint: String,
    pub from: String,
    pub admin_email: Option<String>,
    pub api_key: Option<SecretString>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.resend.com/emails".to_string(),
            from: "Axkan Bot <bot@axkan.mx>".to_string(),
            admin_email: None,
            api_key: None,
        }
    }
}

/// External order system settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderSinkConfig {
    pub url: Option<String>,
    pub token: Option<SecretString>,
}

/// Turn pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of stored messages loaded as model context.
    pub history_limit: u32,
    /// Trailing digits compared when linking a conversation to a client.
    pub phone_suffix_digits: usize,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout_secs: u64,
    /// Minimum spacing between credential alerts.
    pub alert_cooldown_secs: u64,
    /// Upper bound on concurrently processed turns.
    pub max_inflight_turns: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            phone_suffix_digits: 10,
            http_timeout_secs: 30,
            alert_cooldown_secs: 60 * 60,
            max_inflight_turns: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.history_limit, 20);
        assert_eq!(config.pipeline.alert_cooldown_secs, 3600);
        assert_eq!(config.speech.language, "es-MX");
        assert_eq!(config.llm.max_tokens, 300);
        assert!(config.whatsapp.access_token.is_none());
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.storage.folder, "whatsapp-media");
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
[whatsapp]
phone_number_id = "1234567890"
verify_token = "s3cret"

[pipeline]
history_limit = 10
"#,
        )
        .unwrap();
        assert_eq!(config.whatsapp.phone_number_id, "1234567890");
        assert!(config.whatsapp.verify_token.is_some());
        assert_eq!(config.pipeline.history_limit, 10);
        assert_eq!(config.pipeline.phone_suffix_digits, 10);
        assert_eq!(config.whatsapp.api_base, "https://graph.facebook.com/v22.0");
    }
}
