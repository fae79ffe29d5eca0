//! Cache warm-up: translate a whole content corpus into every target
//! language ahead of time, exposing progress counters for polling.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

use crate::i18n::Language;
use crate::translation::walker::{DocumentWalker, WalkError};

#[derive(Debug, Error)]
pub enum WarmupError {
    #[error("a cache warm-up is already running")]
    AlreadyRunning,

    #[error("content could not be scanned: {0}")]
    Walk(#[from] WalkError),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WarmupStatus {
    pub running: bool,
    pub total: usize,
    pub completed: usize,
    pub errored: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RunTimes {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Tracks at most one warm-up run at a time.
#[derive(Debug, Default)]
pub struct CacheWarmer {
    running: AtomicBool,
    total: AtomicUsize,
    completed: AtomicUsize,
    errored: AtomicUsize,
    times: Mutex<RunTimes>,
}

impl CacheWarmer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> WarmupStatus {
        let (started_at, finished_at) = self
            .times
            .lock()
            .map(|times| (times.started_at, times.finished_at))
            .unwrap_or_default();

        WarmupStatus {
            running: self.running.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
            started_at,
            finished_at,
        }
    }

    /// Warm the cache and wait for the run to finish.
    pub async fn warm(
        &self,
        walker: &DocumentWalker,
        documents: &[Value],
        languages: &[Language],
        source: Language,
    ) -> Result<WarmupStatus, WarmupError> {
        let (strings, targets) = plan(walker, documents, languages, source)?;
        self.try_begin(strings.len() * targets.len())?;
        self.execute(walker, &strings, &targets, source).await;
        Ok(self.status())
    }

    /// Start a warm-up in the background and return its initial status.
    pub fn spawn(
        self: &Arc<Self>,
        walker: Arc<DocumentWalker>,
        documents: Vec<Value>,
        languages: Vec<Language>,
        source: Language,
    ) -> Result<WarmupStatus, WarmupError> {
        let (strings, targets) = plan(&walker, &documents, &languages, source)?;
        self.try_begin(strings.len() * targets.len())?;

        let warmer = Arc::clone(self);
        tokio::spawn(async move {
            warmer.execute(&walker, &strings, &targets, source).await;
        });

        Ok(self.status())
    }

    fn try_begin(&self, total: usize) -> Result<(), WarmupError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| WarmupError::AlreadyRunning)?;

        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.errored.store(0, Ordering::SeqCst);
        if let Ok(mut times) = self.times.lock() {
            times.started_at = Some(Utc::now());
            times.finished_at = None;
        }
        Ok(())
    }

    async fn execute(
        &self,
        walker: &DocumentWalker,
        strings: &[String],
        targets: &[Language],
        source: Language,
    ) {
        info!(
            "Warming translation cache: {} strings x {} languages",
            strings.len(),
            targets.len()
        );

        let engine = walker.engine();
        let jobs: Vec<(String, Language)> = targets
            .iter()
            .flat_map(|target| strings.iter().map(|text| (text.clone(), *target)))
            .collect();

        stream::iter(jobs)
            .map(|(text, target)| async move { engine.translate(&text, target, source).await })
            .buffer_unordered(engine.settings().concurrency.max(1))
            .for_each(|outcome| {
                if outcome.is_fallback() {
                    self.errored.fetch_add(1, Ordering::SeqCst);
                } else {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                }
                futures::future::ready(())
            })
            .await;

        if let Ok(mut times) = self.times.lock() {
            times.finished_at = Some(Utc::now());
        }
        self.running.store(false, Ordering::SeqCst);

        let status = self.status();
        if status.errored > 0 {
            warn!(
                "Cache warm-up finished with {} errors ({} of {} translated)",
                status.errored, status.completed, status.total
            );
        } else {
            info!("Cache warm-up finished: {} translations", status.completed);
        }
    }
}

/// Distinct strings of the corpus and the languages to translate them into.
fn plan(
    walker: &DocumentWalker,
    documents: &[Value],
    languages: &[Language],
    source: Language,
) -> Result<(Vec<String>, Vec<Language>), WalkError> {
    let mut seen = HashSet::new();
    let mut strings = Vec::new();
    for document in documents {
        for text in walker.collect_strings(document)? {
            if seen.insert(text.clone()) {
                strings.push(text);
            }
        }
    }

    let targets = languages
        .iter()
        .copied()
        .filter(|language| *language != source)
        .collect();

    Ok((strings, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::translation::cache::MemoryCache;
    use crate::translation::classify::Classifier;
    use crate::translation::engine::{EngineSettings, TranslationEngine};
    use crate::translation::test_support::{Behavior, StubTranslator};
    use serde_json::json;
    use std::time::Duration;

    fn walker(stub: Arc<StubTranslator>, cache: Arc<MemoryCache>) -> DocumentWalker {
        let engine = TranslationEngine::new(
            stub,
            Some(cache),
            EngineSettings {
                retry: RetryConfig::new(1, Duration::from_millis(1)),
                ..EngineSettings::default()
            },
        );
        DocumentWalker::new(Arc::new(engine), Arc::new(Classifier::default()))
    }

    fn corpus() -> Vec<Value> {
        vec![
            json!({ "id": 1, "title": "Sobre mí", "bio": "Desarrollador de software" }),
            json!([{ "title": "Sobre mí" }, { "title": "Proyectos" }]),
        ]
    }

    #[tokio::test]
    async fn test_warm_counts_every_string_language_pair() {
        let stub = StubTranslator::new(Behavior::Tag);
        let cache = Arc::new(MemoryCache::new());
        let walker = walker(stub.clone(), cache.clone());
        let warmer = CacheWarmer::new();

        let status = warmer
            .warm(&walker, &corpus(), &Language::all_enabled(), Language::SPANISH)
            .await
            .unwrap();

        // 3 distinct strings x 5 non-source languages
        assert_eq!(status.total, 15);
        assert_eq!(status.completed, 15);
        assert_eq!(status.errored, 0);
        assert!(!status.running);
        assert!(status.started_at.is_some());
        assert!(status.finished_at.is_some());
        assert_eq!(stub.calls(), 15);
        assert_eq!(cache.len(), 15);
    }

    #[tokio::test]
    async fn test_warm_records_errors() {
        let stub = StubTranslator::new(Behavior::Fail(500));
        let walker = walker(stub, Arc::new(MemoryCache::new()));
        let warmer = CacheWarmer::new();

        let status = warmer
            .warm(&walker, &corpus(), &[Language::ENGLISH], Language::SPANISH)
            .await
            .unwrap();

        assert_eq!(status.total, 3);
        assert_eq!(status.completed, 0);
        assert_eq!(status.errored, 3);
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_running() {
        let stub = StubTranslator::new(Behavior::Sleep(Duration::from_millis(200)));
        let walker = Arc::new(walker(stub, Arc::new(MemoryCache::new())));
        let warmer = Arc::new(CacheWarmer::new());

        let first = warmer
            .spawn(walker.clone(), corpus(), vec![Language::ENGLISH], Language::SPANISH)
            .unwrap();
        assert!(first.running);
        assert_eq!(first.total, 3);

        let second = warmer.spawn(walker, corpus(), vec![Language::ENGLISH], Language::SPANISH);
        assert!(matches!(second, Err(WarmupError::AlreadyRunning)));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        let done = warmer.status();
        assert!(!done.running);
        assert_eq!(done.completed, 3);
    }

    #[test]
    fn test_status_before_any_run() {
        assert_eq!(CacheWarmer::new().status(), WarmupStatus::default());
    }
}
