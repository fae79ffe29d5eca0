//! Response translation pipeline.
//!
//! - `classify`: which fields and strings are eligible
//! - `cache`: cache port with Redis and in-memory backends
//! - `provider`: external translation port and the OpenAI implementation
//! - `engine`: per-string translation with cache, retries and timeout
//! - `walker`: structure-preserving document translation
//! - `warmup`: corpus preloading with progress tracking

pub mod cache;
pub mod classify;
pub mod engine;
pub mod provider;
pub mod walker;
pub mod warmup;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{cache_key, CacheError, MemoryCache, RedisCache, TranslationCache, CACHE_TTL};
pub use classify::{Classifier, FieldAction, FieldPattern, FieldRule, FieldRules, MediaFields, TextRules};
pub use engine::{EngineSettings, FallbackReason, TranslationEngine, TranslationOutcome};
pub use provider::{OpenAiTranslator, TranslateError, Translator};
pub use walker::{normalize_media_paths, DocumentWalker, WalkError};
pub use warmup::{CacheWarmer, WarmupError, WarmupStatus};
