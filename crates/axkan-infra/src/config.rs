//! Configuration loader for Axkan.
//!
//! Reads `config.toml` from the data directory (`~/.axkan/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed. Credentials are then overlaid from the
//! environment so deployments never need secrets on disk.

use std::path::{Path, PathBuf};

use axkan_types::config::AppConfig;
use secrecy::SecretString;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AXKAN_DATA_DIR` environment variable
/// 2. `~/.axkan`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AXKAN_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".axkan");
    }

    PathBuf::from(".axkan")
}

/// Database URL inside the data directory.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/axkan.db?mode=rwc", data_dir.display())
}

/// Load `{data_dir}/config.toml` and overlay the process environment.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let mut config = load_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Read the config file only.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unparseable file: logs a warning and returns the default.
pub async fn load_config_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Overlay deployment variables onto `config`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let secret = |key: &str| var(key).map(SecretString::from);

    if let Some(v) = secret("WHATSAPP_ACCESS_TOKEN") {
        config.whatsapp.access_token = Some(v);
    }
    if let Some(v) = var("WHATSAPP_PHONE_NUMBER_ID") {
        config.whatsapp.phone_number_id = v;
    }
    if let Some(v) = secret("WHATSAPP_VERIFY_TOKEN") {
        config.whatsapp.verify_token = Some(v);
    }
    if let Some(v) = secret("WHATSAPP_APP_SECRET") {
        config.whatsapp.app_secret = Some(v);
    }
    if let Some(v) = secret("ANTHROPIC_API_KEY") {
        config.llm.api_key = Some(v);
    }
    if let Some(v) = secret("GOOGLE_SPEECH_API_KEY") {
        config.speech.api_key = Some(v);
    }
    if let Some(v) = var("CLOUDINARY_CLOUD_NAME") {
        config.storage.cloud_name = v;
    }
    if let Some(v) = secret("CLOUDINARY_API_KEY") {
        config.storage.api_key = Some(v);
    }
    if let Some(v) = secret("CLOUDINARY_API_SECRET") {
        config.storage.api_secret = Some(v);
    }
    if let Some(v) = var("ADMIN_EMAIL") {
        config.notify.admin_email = Some(v);
    }
    if let Some(v) = secret("EMAIL_API_KEY") {
        config.notify.api_key = Some(v);
    }
    if let Some(v) = var("ORDER_SINK_URL") {
        config.order_sink.url = Some(v);
    }
    if let Some(v) = secret("ORDER_SINK_TOKEN") {
        config.order_sink.token = Some(v);
    }
    if let Some(v) = secret("AXKAN_ADMIN_API_KEY") {
        config.http.admin_api_key = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.llm.max_tokens, 300);
        assert_eq!(config.pipeline.history_limit, 20);
        assert!(config.whatsapp.access_token.is_none());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[http]
port = 8080

[pipeline]
history_limit = 10
alert_cooldown_secs = 600
"#,
        )
        .await
        .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.pipeline.history_limit, 10);
        assert_eq!(config.pipeline.alert_cooldown_secs, 600);
        assert_eq!(config.pipeline.phone_suffix_digits, 10);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.http.port, 3000);
    }

    #[test]
    fn env_overrides_fill_credentials() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WHATSAPP_ACCESS_TOKEN", "EAAG-token"),
            ("WHATSAPP_PHONE_NUMBER_ID", "1234567890"),
            ("ADMIN_EMAIL", "ops@axkan.mx"),
            ("ORDER_SINK_URL", ""),
        ]);
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.whatsapp.access_token.as_ref().unwrap().expose_secret(),
            "EAAG-token"
        );
        assert_eq!(config.whatsapp.phone_number_id, "1234567890");
        assert_eq!(config.notify.admin_email.as_deref(), Some("ops@axkan.mx"));
        assert!(config.order_sink.url.is_none());
    }

    #[test]
    fn database_url_points_into_data_dir() {
        let url = database_url(Path::new("/var/lib/axkan"));
        assert_eq!(url, "sqlite:///var/lib/axkan/axkan.db?mode=rwc");
    }
}
