//! Translation cache port and its backends.
//!
//! Keys live under the `translation:` namespace so the whole cache can be
//! cleared with one prefix scan.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::i18n::Language;
use crate::retry::{with_retry, RetryConfig};

pub const CACHE_KEY_PREFIX: &str = "translation:";

/// Cached translations expire after 30 days.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Texts longer than this are hashed rather than embedded in the key.
const MAX_INLINE_KEY_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache state poisoned")]
    Poisoned,
}

#[async_trait]
pub trait TranslationCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn clear(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Deterministic cache key for one translation.
pub fn cache_key(text: &str, target: Language, source: Language) -> String {
    let digest = if text.chars().count() <= MAX_INLINE_KEY_CHARS {
        text.to_string()
    } else {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    };

    format!("{}{}:{}:{}", CACHE_KEY_PREFIX, target.code(), source.code(), digest)
}

/// Redis-backed cache. `ConnectionManager` reconnects on its own after a drop.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let connection = with_retry(&RetryConfig::cache_connect(), "Redis connect", || {
            client.get_connection_manager()
        })
        .await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl TranslationCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut connection = self.connection.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut connection)
                .await?;

            if !keys.is_empty() {
                let removed: usize = connection.del(&keys).await?;
                deleted += removed;
            }

            if next == 0 {
                return Ok(deleted);
            }
            cursor = next;
        }
    }
}

/// Entry count at which `MemoryCache` first sweeps expired entries.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Default)]
struct MemoryEntries {
    map: HashMap<String, (String, Instant)>,
    next_sweep: usize,
}

/// In-process cache with per-entry expiry. Not shared between processes.
///
/// Expired entries are dropped when read and swept whenever the map grows
/// past a threshold that doubles with the live entry count.
pub struct MemoryCache {
    entries: Mutex<MemoryEntries>,
    sweep_threshold: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_sweep_threshold(SWEEP_THRESHOLD)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        Self {
            entries: Mutex::new(MemoryEntries {
                map: HashMap::new(),
                next_sweep: sweep_threshold,
            }),
            sweep_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranslationCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;

        match entries.map.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        entries.map.insert(key.to_string(), (value.to_string(), now + ttl));

        if entries.map.len() > entries.next_sweep {
            entries.map.retain(|_, (_, expires_at)| *expires_at > now);
            let next_sweep = (entries.map.len() * 2).max(self.sweep_threshold);
            entries.next_sweep = next_sweep;
        }
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let before = entries.map.len();
        entries.map.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_short_text_is_inline() {
        let key = cache_key("Hola mundo", Language::ENGLISH, Language::SPANISH);
        assert_eq!(key, "translation:en:es:Hola mundo");
    }

    #[test]
    fn test_cache_key_long_text_is_hashed() {
        let text = "palabra ".repeat(40);
        let key = cache_key(&text, Language::ENGLISH, Language::SPANISH);

        assert!(key.starts_with("translation:en:es:"));
        // SHA-256 hex digest
        assert_eq!(key.len(), "translation:en:es:".len() + 64);
        assert_eq!(key, cache_key(&text, Language::ENGLISH, Language::SPANISH));
    }

    #[test]
    fn test_cache_key_depends_on_target() {
        assert_ne!(
            cache_key("Hola", Language::ENGLISH, Language::SPANISH),
            cache_key("Hola", Language::FRENCH, Language::SPANISH)
        );
    }

    #[tokio::test]
    async fn test_memory_cache_set_get() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("translation:en:es:a").await.unwrap(), None);

        cache
            .set("translation:en:es:a", "b", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("translation:en:es:a").await.unwrap(),
            Some("b".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(20)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_entries_on_growth() {
        let cache = MemoryCache::with_sweep_threshold(2);
        cache.set("translation:en:es:a", "A", Duration::ZERO).await.unwrap();
        cache.set("translation:en:es:b", "B", Duration::ZERO).await.unwrap();
        assert_eq!(cache.len(), 2);

        // Third entry crosses the threshold; the two expired ones are swept
        cache
            .set("translation:en:es:c", "C", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("translation:en:es:c").await.unwrap(),
            Some("C".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_cache_keeps_live_entries_when_sweeping() {
        let cache = MemoryCache::with_sweep_threshold(2);
        for key in ["a", "b", "c", "d", "e"] {
            cache
                .set(&format!("translation:en:es:{}", key), key, Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 5);
    }

    #[tokio::test]
    async fn test_memory_cache_clear_by_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("translation:en:es:uno", "one", ttl).await.unwrap();
        cache.set("translation:fr:es:uno", "un", ttl).await.unwrap();
        cache.set("session:abc", "x", ttl).await.unwrap();

        let deleted = cache.clear(CACHE_KEY_PREFIX).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(cache.len(), 1);
    }
}
