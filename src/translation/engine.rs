//! Translation engine: cache, retries, timeout and paragraph batching.
//!
//! Every path through [`TranslationEngine::translate`] ends in a string.
//! Failures are reported as [`TranslationOutcome::FellBack`] carrying the
//! original text, never as errors.

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::i18n::{Language, TranslationMetrics};
use crate::retry::{with_retry_if, RetryConfig};
use crate::translation::cache::{cache_key, CacheError, TranslationCache, CACHE_KEY_PREFIX, CACHE_TTL};
use crate::translation::provider::{TranslateError, Translator};

/// Blank line(s) between paragraphs, kept verbatim when rejoining.
static PARAGRAPH_BREAK: OnceLock<Regex> = OnceLock::new();

fn paragraph_break() -> &'static Regex {
    PARAGRAPH_BREAK.get_or_init(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid paragraph regex"))
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Strings shorter than this many characters are never translated
    pub min_length: usize,
    /// Wall-clock bound on one external translation, retries included
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub cache_ttl: Duration,
    /// Maximum concurrent external calls when batching paragraphs
    pub concurrency: usize,
    /// Texts longer than this many characters are split into paragraphs
    pub batch_threshold: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_length: 3,
            timeout: Duration::from_secs(10),
            retry: RetryConfig::translation(),
            cache_ttl: CACHE_TTL,
            concurrency: 3,
            batch_threshold: 1500,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_length: config.min_translate_length,
            timeout: config.translate_timeout,
            concurrency: config.translate_concurrency,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Timeout(Duration),
    Failed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Timeout(after) => write!(f, "timed out after {:?}", after),
            FallbackReason::Failed(error) => write!(f, "{}", error),
        }
    }
}

/// Result of translating one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Nothing to do: same language or text too short
    Skipped(String),
    Cached(String),
    Translated(String),
    FellBack {
        original: String,
        reason: FallbackReason,
    },
}

impl TranslationOutcome {
    pub fn text(&self) -> &str {
        match self {
            TranslationOutcome::Skipped(text)
            | TranslationOutcome::Cached(text)
            | TranslationOutcome::Translated(text) => text,
            TranslationOutcome::FellBack { original, .. } => original,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            TranslationOutcome::Skipped(text)
            | TranslationOutcome::Cached(text)
            | TranslationOutcome::Translated(text) => text,
            TranslationOutcome::FellBack { original, .. } => original,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TranslationOutcome::FellBack { .. })
    }
}

pub struct TranslationEngine {
    translator: Arc<dyn Translator>,
    cache: Option<Arc<dyn TranslationCache>>,
    settings: EngineSettings,
    metrics: TranslationMetrics,
    cache_degraded: AtomicBool,
    /// Caps concurrent external calls, however callers fan out
    permits: Semaphore,
}

impl TranslationEngine {
    pub fn new(
        translator: Arc<dyn Translator>,
        cache: Option<Arc<dyn TranslationCache>>,
        settings: EngineSettings,
    ) -> Self {
        if cache.is_none() {
            warn!("No translation cache configured; every translation will call the API");
        }

        Self {
            translator,
            cache,
            metrics: TranslationMetrics::new(),
            cache_degraded: AtomicBool::new(false),
            permits: Semaphore::new(settings.concurrency.max(1)),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    /// True while the cache backend is failing and lookups are bypassed.
    pub fn is_cache_degraded(&self) -> bool {
        self.cache_degraded.load(Ordering::Relaxed)
    }

    /// Translate `text` from `source` to `target`.
    pub async fn translate(&self, text: &str, target: Language, source: Language) -> TranslationOutcome {
        if target == source || !self.is_long_enough(text) {
            return TranslationOutcome::Skipped(text.to_string());
        }

        if text.chars().count() > self.settings.batch_threshold {
            let (paragraphs, separators) = split_paragraphs(text);
            if paragraphs.len() > 1 {
                return self
                    .translate_paragraphs(&paragraphs, &separators, target, source)
                    .await;
            }
        }

        self.translate_one(text, target, source).await
    }

    /// Delete every cached translation. Returns the number of entries removed.
    pub async fn clear_cache(&self) -> Result<usize, CacheError> {
        match &self.cache {
            Some(cache) => {
                let deleted = cache.clear(CACHE_KEY_PREFIX).await?;
                info!("Cleared {} cached translations", deleted);
                Ok(deleted)
            }
            None => Ok(0),
        }
    }

    fn is_long_enough(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= self.settings.min_length
    }

    async fn translate_paragraphs(
        &self,
        paragraphs: &[&str],
        separators: &[&str],
        target: Language,
        source: Language,
    ) -> TranslationOutcome {
        debug!(
            "Translating {} paragraphs to {} ({} at a time)",
            paragraphs.len(),
            target,
            self.settings.concurrency
        );

        let owned: Vec<String> = paragraphs.iter().map(|p| p.to_string()).collect();
        let outcomes: Vec<TranslationOutcome> = stream::iter(owned)
            .map(|paragraph| async move {
                if self.is_long_enough(&paragraph) {
                    self.translate_one(&paragraph, target, source).await
                } else {
                    TranslationOutcome::Skipped(paragraph)
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut joined = String::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            joined.push_str(outcome.text());
            if let Some(separator) = separators.get(i) {
                joined.push_str(separator);
            }
        }

        let attempted: Vec<&TranslationOutcome> = outcomes
            .iter()
            .filter(|o| !matches!(o, TranslationOutcome::Skipped(_)))
            .collect();

        if attempted.is_empty() {
            return TranslationOutcome::Skipped(joined);
        }

        if attempted.iter().all(|o| o.is_fallback()) {
            let reason = attempted
                .iter()
                .find_map(|o| match o {
                    TranslationOutcome::FellBack { reason, .. } => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| FallbackReason::Failed("no paragraph translated".to_string()));
            return TranslationOutcome::FellBack {
                original: joined,
                reason,
            };
        }

        if attempted.iter().all(|o| matches!(o, TranslationOutcome::Cached(_))) {
            TranslationOutcome::Cached(joined)
        } else {
            TranslationOutcome::Translated(joined)
        }
    }

    async fn translate_one(&self, text: &str, target: Language, source: Language) -> TranslationOutcome {
        let key = cache_key(text, target, source);

        if let Some(cached) = self.cache_get(&key).await {
            self.metrics.record_cache_hit();
            return TranslationOutcome::Cached(cached);
        }
        self.metrics.record_cache_miss();

        let operation_name = format!("Translation {}->{}", source, target);
        let call = with_retry_if(
            &self.settings.retry,
            &operation_name,
            || async move {
                self.metrics.record_api_call();
                let result = self.translator.translate(text, target, source).await;
                if result.is_err() {
                    self.metrics.record_api_failure();
                }
                result
            },
            TranslateError::is_retryable,
        );

        // The semaphore is never closed
        let _permit = self.permits.acquire().await.ok();
        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(translated)) => {
                let translated = translated.trim().to_string();
                if translated.is_empty() {
                    self.metrics.record_api_failure();
                    return TranslationOutcome::FellBack {
                        original: text.to_string(),
                        reason: FallbackReason::Failed(TranslateError::Empty.to_string()),
                    };
                }
                self.cache_set(&key, &translated).await;
                TranslationOutcome::Translated(translated)
            }
            Ok(Err(e)) => {
                warn!("{} failed, keeping original text: {}", operation_name, e);
                TranslationOutcome::FellBack {
                    original: text.to_string(),
                    reason: FallbackReason::Failed(e.to_string()),
                }
            }
            Err(_) => {
                self.metrics.record_timeout();
                warn!(
                    "{} timed out after {:?}, keeping original text",
                    operation_name, self.settings.timeout
                );
                TranslationOutcome::FellBack {
                    original: text.to_string(),
                    reason: FallbackReason::Timeout(self.settings.timeout),
                }
            }
        }
    }

    async fn cache_get(&self, key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(value) => {
                self.mark_cache_healthy();
                value
            }
            Err(e) => {
                self.mark_cache_degraded(&e);
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, value: &str) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match cache.set(key, value, self.settings.cache_ttl).await {
            Ok(()) => self.mark_cache_healthy(),
            Err(e) => self.mark_cache_degraded(&e),
        }
    }

    fn mark_cache_degraded(&self, error: &CacheError) {
        self.metrics.record_cache_error();
        // Log the transition only, not every failed call
        if !self.cache_degraded.swap(true, Ordering::Relaxed) {
            warn!(
                "Translation cache unavailable, continuing without cache: {}",
                error
            );
        }
    }

    fn mark_cache_healthy(&self) {
        if self.cache_degraded.swap(false, Ordering::Relaxed) {
            info!("Translation cache is reachable again");
        }
    }
}

/// Split on blank lines. Returns paragraphs and the separators between them.
fn split_paragraphs(text: &str) -> (Vec<&str>, Vec<&str>) {
    let mut paragraphs = Vec::new();
    let mut separators = Vec::new();
    let mut last = 0;

    for found in paragraph_break().find_iter(text) {
        paragraphs.push(&text[last..found.start()]);
        separators.push(found.as_str());
        last = found.end();
    }
    paragraphs.push(&text[last..]);

    (paragraphs, separators)
}
