//! Application state wiring all adapters together.
//!
//! `LivePorts` pins the turn pipeline's collaborator traits to the concrete
//! infra adapters. `AppState` holds the processor, the turn worker, and the
//! settings the HTTP layer needs, and is shared by CLI commands and handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axkan_core::channel::health::{HealthSnapshot, TokenHealthMonitor};
use axkan_core::channel::monitored::Monitored;
use axkan_core::pipeline::{TurnPorts, TurnProcessor, TurnSettings};
use axkan_infra::config::{database_url, load_config, resolve_data_dir};
use axkan_infra::llm::anthropic::AnthropicProvider;
use axkan_infra::media::{CloudinaryStorage, GoogleSpeech};
use axkan_infra::notify::EmailNotifier;
use axkan_infra::optional::Optional;
use axkan_infra::sink::HttpOrderSink;
use axkan_infra::sqlite::catalog::SqliteCatalogProvider;
use axkan_infra::sqlite::conversation::SqliteConversationRepository;
use axkan_infra::sqlite::order::SqliteOrderStore;
use axkan_infra::sqlite::pool::DatabasePool;
use axkan_infra::whatsapp::WhatsAppClient;
use axkan_types::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};

use crate::http::extractors::auth::hash_api_key;
use crate::worker::TurnWorker;

pub type LiveWhatsApp = Monitored<Optional<WhatsAppClient>, EmailNotifier>;
pub type LiveSink = Monitored<HttpOrderSink, EmailNotifier>;
pub type LiveProcessor = TurnProcessor<LivePorts>;

/// Concrete collaborators of a turn.
pub struct LivePorts {
    repo: SqliteConversationRepository,
    api: LiveWhatsApp,
    storage: Optional<CloudinaryStorage>,
    speech: Optional<GoogleSpeech>,
    llm: Optional<AnthropicProvider>,
    catalog: SqliteCatalogProvider,
    orders: SqliteOrderStore,
    sink: LiveSink,
}

impl LivePorts {
    /// Build every adapter from configuration. Providers whose credentials
    /// are missing stay wired but unconfigured.
    pub fn build(config: &AppConfig, db_pool: &DatabasePool) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.pipeline.http_timeout_secs);
        let cooldown = Duration::from_secs(config.pipeline.alert_cooldown_secs);

        let whatsapp_monitor = Arc::new(TokenHealthMonitor::new(
            "whatsapp",
            cooldown,
            EmailNotifier::new(&config.notify, timeout)?,
        ));
        let sink_monitor = Arc::new(TokenHealthMonitor::new(
            "order_sink",
            cooldown,
            EmailNotifier::new(&config.notify, timeout)?,
        ));

        let api = Optional::from_result(
            WhatsAppClient::new(&config.whatsapp, timeout),
            "WHATSAPP_ACCESS_TOKEN",
        );
        let llm = match &config.llm.api_key {
            Some(key) => Optional::present(
                AnthropicProvider::new(key.clone(), timeout)?.with_base_url(&config.llm.base_url),
                "ANTHROPIC_API_KEY",
            ),
            None => {
                tracing::warn!("ANTHROPIC_API_KEY not set, every turn will use the fallback reply");
                Optional::absent("ANTHROPIC_API_KEY")
            }
        };

        Ok(Self {
            repo: SqliteConversationRepository::new(db_pool.clone()),
            api: Monitored::new(api, whatsapp_monitor),
            storage: Optional::from_result(
                CloudinaryStorage::new(&config.storage, timeout),
                "CLOUDINARY_CLOUD_NAME",
            ),
            speech: Optional::from_result(
                GoogleSpeech::new(&config.speech, timeout),
                "GOOGLE_SPEECH_API_KEY",
            ),
            llm,
            catalog: SqliteCatalogProvider::new(db_pool.clone()),
            orders: SqliteOrderStore::new(db_pool.clone()),
            sink: Monitored::new(HttpOrderSink::new(&config.order_sink, timeout)?, sink_monitor),
        })
    }

    /// Breaker state of every monitored credential.
    pub fn health(&self) -> Vec<HealthSnapshot> {
        vec![self.api.monitor().snapshot(), self.sink.monitor().snapshot()]
    }
}

impl TurnPorts for LivePorts {
    type Repo = SqliteConversationRepository;
    type Api = LiveWhatsApp;
    type Storage = Optional<CloudinaryStorage>;
    type Speech = Optional<GoogleSpeech>;
    type Llm = Optional<AnthropicProvider>;
    type Catalog = SqliteCatalogProvider;
    type Orders = SqliteOrderStore;
    type Sink = LiveSink;

    fn repo(&self) -> &Self::Repo {
        &self.repo
    }
    fn api(&self) -> &Self::Api {
        &self.api
    }
    fn storage(&self) -> &Self::Storage {
        &self.storage
    }
    fn speech(&self) -> &Self::Speech {
        &self.speech
    }
    fn llm(&self) -> &Self::Llm {
        &self.llm
    }
    fn catalog(&self) -> &Self::Catalog {
        &self.catalog
    }
    fn orders(&self) -> &Self::Orders {
        &self.orders
    }
    fn sink(&self) -> &Self::Sink {
        &self.sink
    }
}

/// Shared application state.
///
/// Used by both CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<LiveProcessor>,
    pub worker: TurnWorker,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    /// SHA-256 hex digest of the operator API key, if one is configured.
    pub admin_key_digest: Option<String>,
}

impl AppState {
    /// Initialize the application state: load config, connect to the DB,
    /// wire the adapters.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Self::build(config, data_dir, db_pool)
    }

    /// Wire state from an already-loaded config and pool.
    pub fn build(config: AppConfig, data_dir: PathBuf, db_pool: DatabasePool) -> anyhow::Result<Self> {
        let ports = LivePorts::build(&config, &db_pool)?;
        let settings = TurnSettings {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            history_limit: config.pipeline.history_limit,
            phone_suffix_digits: config.pipeline.phone_suffix_digits,
        };
        let processor = Arc::new(TurnProcessor::new(ports, settings));
        let worker = TurnWorker::new(processor.clone(), config.pipeline.max_inflight_turns);

        let admin_key_digest = config
            .http
            .admin_api_key
            .as_ref()
            .map(|key| hash_api_key(key.expose_secret()));

        Ok(Self {
            processor,
            worker,
            config: Arc::new(config),
            data_dir,
            admin_key_digest,
        })
    }

    pub fn ports(&self) -> &LivePorts {
        self.processor.ports()
    }

    pub fn verify_token(&self) -> Option<&SecretString> {
        self.config.whatsapp.verify_token.as_ref()
    }

    pub fn app_secret(&self) -> Option<&SecretString> {
        self.config.whatsapp.app_secret.as_ref()
    }
}

#[cfg(test)]
pub(crate) async fn test_state(config: AppConfig) -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_path_buf();
    let db_pool = DatabasePool::new(&database_url(&data_dir)).await.unwrap();
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    AppState::build(config, data_dir, db_pool).unwrap()
}
