//! Response interceptor: rewrites JSON bodies into the requested language
//! after the handler has produced them.

use axum::body::{to_bytes, Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::i18n::Language;
use crate::middleware::gate::{GateDecision, LanguageGate, PassReason};
use crate::translation::walker::{normalize_media_paths, DocumentWalker};

/// Largest handler body the interceptor will buffer. Bigger or unsized
/// bodies are sent untranslated.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// State shared by every request passing through [`translate_responses`].
pub struct TranslationLayer {
    gate: LanguageGate,
    walker: Arc<DocumentWalker>,
    max_body_bytes: usize,
}

impl TranslationLayer {
    pub fn new(gate: LanguageGate, walker: Arc<DocumentWalker>) -> Self {
        Self {
            gate,
            walker,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn gate(&self) -> &LanguageGate {
        &self.gate
    }

    /// Translate a JSON body. `None` means the original bytes should be sent.
    pub async fn translate_body(&self, body: &[u8], target: Language) -> Option<Vec<u8>> {
        let document: Value = match serde_json::from_slice(body) {
            Ok(document) => document,
            Err(e) => {
                debug!("Response body is not valid JSON, sending as-is: {}", e);
                return None;
            }
        };

        if !document.is_object() && !document.is_array() {
            return None;
        }

        let mut translated = match self
            .walker
            .walk(&document, target, self.gate.source())
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Sending untranslated response: {}", e);
                return None;
            }
        };

        normalize_media_paths(&mut translated, self.walker.classifier());

        match serde_json::to_vec(&translated) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!("Failed to serialize translated response: {}", e);
                None
            }
        }
    }
}

/// Middleware translating eligible JSON responses into the `lang` query language.
pub async fn translate_responses(
    State(layer): State<Arc<TranslationLayer>>,
    request: Request,
    next: Next,
) -> Response {
    let target = match layer.gate.decide(request.method(), request.uri()) {
        GateDecision::Translate(target) => target,
        GateDecision::PassThrough(PassReason::Unsupported(code)) => {
            warn!(
                "Unsupported language '{}' requested for {}, serving original",
                code,
                request.uri().path()
            );
            return next.run(request).await;
        }
        GateDecision::PassThrough(_) => return next.run(request).await,
    };

    let response = next.run(request).await;
    if !response.status().is_success() || !is_json(response.headers()) {
        return response;
    }

    match response.body().size_hint().upper() {
        Some(size) if size <= layer.max_body_bytes as u64 => {}
        size => {
            warn!(
                "Response body too large to translate ({:?} bytes, limit {}), serving original",
                size, layer.max_body_bytes
            );
            return response;
        }
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, layer.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read response body for translation: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match layer.translate_body(&bytes, target).await {
        Some(translated) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            if let Ok(value) = HeaderValue::from_str(target.code()) {
                parts.headers.insert(header::CONTENT_LANGUAGE, value);
            }
            Response::from_parts(parts, Body::from(translated))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|content_type| {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}
