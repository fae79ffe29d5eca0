//! Translator and cache doubles shared by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::i18n::Language;
use crate::translation::cache::{CacheError, TranslationCache};
use crate::translation::provider::{TranslateError, Translator};

pub enum Behavior {
    /// Answer "[target] text"
    Tag,
    /// Fail with the given HTTP status every time
    Fail(u16),
    /// Fail `n` times with a 503, then tag
    FailTimes(usize),
    Sleep(Duration),
}

pub struct StubTranslator {
    calls: AtomicUsize,
    behavior: Behavior,
}

impl StubTranslator {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(
        &self,
        text: &str,
        target: Language,
        _source: Language,
    ) -> Result<String, TranslateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Tag => Ok(format!("[{}] {}", target, text)),
            Behavior::Fail(status) => Err(TranslateError::Api {
                status: *status,
                body: "stub failure".to_string(),
            }),
            Behavior::FailTimes(n) if call < *n => Err(TranslateError::Api {
                status: 503,
                body: "busy".to_string(),
            }),
            Behavior::FailTimes(_) => Ok(format!("[{}] {}", target, text)),
            Behavior::Sleep(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(text.to_string())
            }
        }
    }
}

fn connection_refused() -> CacheError {
    redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into()
}

/// A cache whose backend is always down.
#[derive(Default)]
pub struct DownCache;

#[async_trait]
impl TranslationCache for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(connection_refused())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(connection_refused())
    }

    async fn clear(&self, _prefix: &str) -> Result<usize, CacheError> {
        Err(connection_refused())
    }
}

/// Records the highest number of overlapping calls.
pub struct InFlightTranslator {
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl InFlightTranslator {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for InFlightTranslator {
    async fn translate(
        &self,
        text: &str,
        target: Language,
        _source: Language,
    ) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("[{}] {}", target, text))
    }
}
