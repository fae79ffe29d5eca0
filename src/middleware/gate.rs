//! Language gate: decides per request whether the response is translated.
//!
//! The gate fails open. A missing, malformed or unsupported `lang` value
//! just means the response is served untranslated.

use axum::extract::Query;
use axum::http::{Method, Uri};
use serde::Deserialize;

use crate::i18n::Language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassReason {
    /// Not a GET under the API prefix
    NotEligible,
    NoLanguage,
    Unsupported(String),
    SourceLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough(PassReason),
    Translate(Language),
}

#[derive(Debug, Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LanguageGate {
    api_prefix: String,
    source: Language,
}

impl LanguageGate {
    pub fn new(api_prefix: impl Into<String>, source: Language) -> Self {
        Self {
            api_prefix: api_prefix.into(),
            source,
        }
    }

    pub fn source(&self) -> Language {
        self.source
    }

    pub fn decide(&self, method: &Method, uri: &Uri) -> GateDecision {
        if method != Method::GET || !self.is_api_path(uri.path()) {
            return GateDecision::PassThrough(PassReason::NotEligible);
        }

        let requested = match Query::<LangQuery>::try_from_uri(uri) {
            Ok(Query(LangQuery { lang: Some(lang) })) => lang.trim().to_ascii_lowercase(),
            Ok(_) => return GateDecision::PassThrough(PassReason::NoLanguage),
            // Repeated or undecodable parameters
            Err(_) => {
                return GateDecision::PassThrough(PassReason::Unsupported(
                    uri.query().unwrap_or_default().to_string(),
                ))
            }
        };

        if requested.is_empty() {
            return GateDecision::PassThrough(PassReason::NoLanguage);
        }

        match Language::from_code(&requested) {
            Ok(language) if language == self.source => {
                GateDecision::PassThrough(PassReason::SourceLanguage)
            }
            Ok(language) => GateDecision::Translate(language),
            Err(_) => GateDecision::PassThrough(PassReason::Unsupported(requested)),
        }
    }

    fn is_api_path(&self, path: &str) -> bool {
        match path.strip_prefix(self.api_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
