//! Shared application state.
//!
//! [`AppContext`] bundles the configuration with the collaborators every
//! command needs: the SQLite store, the embedding provider, the answer
//! synthesizer, the field extractor, the optional chat client and the
//! webhook notifier. The CLI builds one per invocation; the HTTP server
//! builds one at startup and shares it behind an `Arc`.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use contract_intel_core::models::Document;
use contract_intel_core::store::DocumentRepository;
use contract_intel_core::CoreError;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::fields::{create_extractor, FieldExtractor};
use crate::llm::ChatClient;
use crate::migrate::apply_schema;
use crate::sqlite_store::SqliteStore;
use crate::synthesis::{create_synthesizer, AnswerSynthesizer};
use crate::webhook::WebhookNotifier;

pub struct AppContext {
    pub config: Config,
    pub store: SqliteStore,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
    pub extractor: Arc<dyn FieldExtractor>,
    pub llm: Option<Arc<ChatClient>>,
    pub webhook: WebhookNotifier,
}

impl AppContext {
    /// Connect to the configured database (creating the schema if needed)
    /// and build every collaborator.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Self::with_pool(config, pool)
    }

    pub fn with_pool(config: &Config, pool: SqlitePool) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;

        let llm = if config.llm.is_openai() {
            match ChatClient::from_config(&config.llm) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "LLM unavailable, using offline extractive mode");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            store: SqliteStore::new(pool, embedder.model_name()),
            synthesizer: create_synthesizer(&config.llm, llm.clone()),
            extractor: create_extractor(&config.llm, llm.clone()),
            embedder,
            llm,
            webhook: WebhookNotifier::from_config(&config.webhook)?,
        })
    }

    /// Load a document, failing with [`CoreError::DocumentNotFound`].
    pub async fn document(&self, id: &str) -> Result<Document> {
        match self.store.get_document(id).await? {
            Some(doc) => Ok(doc),
            None => Err(CoreError::DocumentNotFound(id.to_string()).into()),
        }
    }

    /// Wait for pending webhook deliveries, then close the pool.
    pub async fn close(&self) {
        self.webhook.flush().await;
        self.store.pool().close().await;
    }
}
