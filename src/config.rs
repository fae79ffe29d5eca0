use crate::i18n::Language;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Where translations are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Redis(String),
    Memory,
    None,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub api_prefix: String,
    pub content_dir: PathBuf,

    // Translation
    pub source_language: Language,
    pub translate_timeout: Duration,
    pub min_translate_length: usize,
    pub translate_concurrency: usize,
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // Cache
    pub cache_backend: CacheBackend,

    // Admin
    pub admin_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source_language = match var("SOURCE_LANGUAGE") {
            Some(code) => Language::from_code(code.trim())
                .with_context(|| format!("SOURCE_LANGUAGE '{}' is not supported", code))?,
            None => Language::canonical(),
        };

        let redis_url = var("REDIS_URL");
        let cache_backend = match var("CACHE_BACKEND").as_deref().map(str::trim) {
            Some("redis") => CacheBackend::Redis(
                redis_url.context("CACHE_BACKEND=redis requires REDIS_URL")?,
            ),
            Some("memory") => CacheBackend::Memory,
            Some("none") => CacheBackend::None,
            Some(other) => anyhow::bail!(
                "Invalid CACHE_BACKEND '{}': expected redis, memory or none",
                other
            ),
            None => match redis_url {
                Some(url) => CacheBackend::Redis(url),
                None => CacheBackend::None,
            },
        };

        Ok(Self {
            // Server
            port: parse_or(&var, "PORT", 8080)?,
            api_prefix: normalize_prefix(&var("API_PREFIX").unwrap_or_else(|| "/api".to_string())),
            content_dir: PathBuf::from(var("CONTENT_DIR").unwrap_or_else(|| "content".to_string())),

            // Translation
            source_language,
            translate_timeout: Duration::from_millis(parse_or(&var, "TRANSLATE_TIMEOUT_MS", 10_000)?),
            min_translate_length: parse_or(&var, "TRANSLATE_MIN_LENGTH", 3)?,
            translate_concurrency: parse_or::<usize>(&var, "TRANSLATE_CONCURRENCY", 3)?.max(1),
            include_fields: split_list(var("TRANSLATE_INCLUDE_FIELDS")),
            exclude_fields: split_list(var("TRANSLATE_EXCLUDE_FIELDS")),

            // OpenAI
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_api_url: var("OPENAI_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),

            cache_backend,

            admin_api_key: var("ADMIN_API_KEY"),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// "/api/" and "api" both become "/api".
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
