use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{CacheBackend, Config};
use crate::content::ContentStore;
use crate::middleware::{LanguageGate, TranslationLayer};
use crate::translation::{
    CacheWarmer, Classifier, DocumentWalker, EngineSettings, FieldRules, MediaFields,
    MemoryCache, OpenAiTranslator, RedisCache, TextRules, TranslationCache, TranslationEngine,
    Translator,
};

/// Everything the handlers and the translation middleware share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<TranslationEngine>,
    pub walker: Arc<DocumentWalker>,
    pub translation: Arc<TranslationLayer>,
    pub warmer: Arc<CacheWarmer>,
    pub content: ContentStore,
}

impl AppState {
    /// Wire the production collaborators: OpenAI translator and the configured cache.
    pub async fn new(config: Config) -> Result<Self> {
        if config.openai_api_key.is_none() {
            error!("OPENAI_API_KEY is not set: every response will be served untranslated");
        }

        let client = reqwest::Client::builder()
            .timeout(config.translate_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let translator = Arc::new(OpenAiTranslator::from_config(client, &config));
        let cache = connect_cache(&config.cache_backend).await;

        Ok(Self::with_parts(config, translator, cache))
    }

    pub fn with_parts(
        config: Config,
        translator: Arc<dyn Translator>,
        cache: Option<Arc<dyn TranslationCache>>,
    ) -> Self {
        let engine = Arc::new(TranslationEngine::new(
            translator,
            cache,
            EngineSettings::from_config(&config),
        ));

        let classifier = Arc::new(Classifier {
            fields: FieldRules::with_overrides(&config.include_fields, &config.exclude_fields),
            text: TextRules::with_min_length(config.min_translate_length),
            media: MediaFields::default(),
        });

        let walker = Arc::new(DocumentWalker::new(Arc::clone(&engine), classifier));
        let gate = LanguageGate::new(config.api_prefix.clone(), config.source_language);
        let translation = Arc::new(TranslationLayer::new(gate, Arc::clone(&walker)));

        Self {
            content: ContentStore::new(config.content_dir.clone()),
            config: Arc::new(config),
            engine,
            walker,
            translation,
            warmer: Arc::new(CacheWarmer::new()),
        }
    }
}

async fn connect_cache(backend: &CacheBackend) -> Option<Arc<dyn TranslationCache>> {
    match backend {
        CacheBackend::Redis(url) => match RedisCache::connect(url).await {
            Ok(cache) => {
                info!("Connected to Redis translation cache");
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!("Redis unavailable, running without translation cache: {}", e);
                None
            }
        },
        CacheBackend::Memory => {
            info!("Using in-memory translation cache");
            Some(Arc::new(MemoryCache::new()))
        }
        CacheBackend::None => None,
    }
}
