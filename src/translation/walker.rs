//! Structure-preserving JSON translation.
//!
//! A walk runs in two passes. The first collects the distinct translatable
//! strings of the document; the engine translates them with bounded
//! concurrency; the second pass rebuilds the document, swapping each
//! eligible string for its translation. Keys, key order, array lengths and
//! nesting never change.

use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::i18n::Language;
use crate::translation::classify::Classifier;
use crate::translation::engine::TranslationEngine;

/// Documents nested deeper than this are refused.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalkError {
    #[error("document is nested deeper than {max} levels")]
    TooDeep { max: usize },
}

pub struct DocumentWalker {
    engine: Arc<TranslationEngine>,
    classifier: Arc<Classifier>,
    concurrency: usize,
    max_depth: usize,
}

impl DocumentWalker {
    pub fn new(engine: Arc<TranslationEngine>, classifier: Arc<Classifier>) -> Self {
        let concurrency = engine.settings().concurrency.max(1);
        Self {
            engine,
            classifier,
            concurrency,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn engine(&self) -> &Arc<TranslationEngine> {
        &self.engine
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Distinct translatable strings of `document`, in first-seen order.
    pub fn collect_strings(&self, document: &Value) -> Result<Vec<String>, WalkError> {
        let mut seen = HashSet::new();
        let mut strings = Vec::new();
        self.collect_into(document, 0, &mut seen, &mut strings)?;
        Ok(strings)
    }

    /// Translate every eligible leaf of `document` into `target`.
    pub async fn walk(
        &self,
        document: &Value,
        target: Language,
        source: Language,
    ) -> Result<Value, WalkError> {
        let strings = self.collect_strings(document)?;
        if strings.is_empty() || target == source {
            return Ok(document.clone());
        }

        debug!("Translating {} distinct strings to {}", strings.len(), target);

        let translations: HashMap<String, String> = stream::iter(strings)
            .map(|text| async move {
                let translated = self.engine.translate(&text, target, source).await.into_text();
                (text, translated)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Ok(self.rebuild(document, &translations))
    }

    fn collect_into(
        &self,
        value: &Value,
        depth: usize,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) -> Result<(), WalkError> {
        if depth > self.max_depth {
            return Err(WalkError::TooDeep {
                max: self.max_depth,
            });
        }

        match value {
            Value::String(text) => {
                if self.classifier.text.is_translatable(text) && seen.insert(text.clone()) {
                    out.push(text.clone());
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_into(item, depth + 1, seen, out)?;
                }
            }
            Value::Object(fields) => {
                for (key, field) in fields {
                    if self.classifier.fields.is_excluded(key) {
                        continue;
                    }
                    self.collect_into(field, depth + 1, seen, out)?;
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }

        Ok(())
    }

    fn rebuild(&self, value: &Value, translations: &HashMap<String, String>) -> Value {
        match value {
            Value::String(text) => translations
                .get(text)
                .map(|translated| Value::String(translated.clone()))
                .unwrap_or_else(|| value.clone()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.rebuild(item, translations))
                    .collect(),
            ),
            Value::Object(fields) => {
                let mut rebuilt = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    let field = if self.classifier.fields.is_excluded(key) {
                        field.clone()
                    } else {
                        self.rebuild(field, translations)
                    };
                    rebuilt.insert(key.clone(), field);
                }
                Value::Object(rebuilt)
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }
}

/// Prefix relative media paths with `/` so they resolve from the site root.
///
/// Absolute URLs (`scheme://`, `//`, `data:`, `blob:`) and root-relative
/// paths are left alone.
pub fn normalize_media_paths(value: &mut Value, classifier: &Classifier) {
    match value {
        Value::Array(items) => {
            for item in items {
                normalize_media_paths(item, classifier);
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields.iter_mut() {
                match field {
                    Value::String(path) if classifier.media.matches(key) => {
                        if needs_root_prefix(path) {
                            path.insert(0, '/');
                        }
                    }
                    other => normalize_media_paths(other, classifier),
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

fn needs_root_prefix(path: &str) -> bool {
    let path = path.trim();
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains("://")
        && !path.starts_with("data:")
        && !path.starts_with("blob:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::engine::EngineSettings;
    use crate::translation::test_support::{Behavior, StubTranslator};
    use proptest::prelude::*;
    use serde_json::json;

    fn walker_with(stub: Arc<StubTranslator>) -> DocumentWalker {
        let engine = Arc::new(TranslationEngine::new(
            stub,
            None,
            EngineSettings {
                retry: crate::retry::RetryConfig::new(1, std::time::Duration::from_millis(1)),
                ..EngineSettings::default()
            },
        ));
        DocumentWalker::new(engine, Arc::new(Classifier::default()))
    }

    async fn to_english(walker: &DocumentWalker, document: &Value) -> Value {
        walker
            .walk(document, Language::ENGLISH, Language::SPANISH)
            .await
            .expect("walk should succeed")
    }

    #[tokio::test]
    async fn test_mixed_project_document() {
        let walker = walker_with(StubTranslator::new(Behavior::Tag));
        let document = json!({
            "id": 7,
            "title": "Mi Proyecto",
            "imageUrl": "proyecto.jpg",
            "technologies": ["React", "Node"]
        });

        let translated = to_english(&walker, &document).await;

        // Technology names clear the 3-character threshold, so they are sent
        // to the translator like any other copy.
        assert_eq!(
            translated,
            json!({
                "id": 7,
                "title": "[en] Mi Proyecto",
                "imageUrl": "proyecto.jpg",
                "technologies": ["[en] React", "[en] Node"]
            })
        );
    }

    #[tokio::test]
    async fn test_excluded_fields_keep_long_strings() {
        let stub = StubTranslator::new(Behavior::Tag);
        let walker = walker_with(stub.clone());
        let document = json!({
            "id": "un identificador bastante largo",
            "slug": "mi-primer-articulo-sobre-rust",
            "createdAt": "ayer por la tarde",
            "userId": "usuario principal del sitio",
            "email": "contacto en el sitio web",
            "token": "secreto muy largo y privado",
            "metadata": { "authorId": "alguien importante", "summary": "Resumen breve" }
        });

        let translated = to_english(&walker, &document).await;

        let mut expected = document.clone();
        expected["metadata"]["summary"] = json!("[en] Resumen breve");
        assert_eq!(translated, expected);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_urls_and_files_untouched_under_any_key() {
        let stub = StubTranslator::new(Behavior::Tag);
        let walker = walker_with(stub.clone());
        let document = json!({
            "title": "https://example.com/x.png",
            "description": "/images/a.jpg",
            "content": ["www.example.com", "cv-2024.pdf"]
        });

        let translated = to_english(&walker, &document).await;

        assert_eq!(translated, document);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_excluded_key_protects_nested_values() {
        let walker = walker_with(StubTranslator::new(Behavior::Tag));
        let document = json!({ "imageUrl": { "alt": "Foto de portada" }, "tags": [{ "name": "Diseño" }] });

        let translated = to_english(&walker, &document).await;

        assert_eq!(translated["imageUrl"], document["imageUrl"]);
        assert_eq!(translated["tags"][0]["name"], "[en] Diseño");
    }

    #[tokio::test]
    async fn test_duplicate_strings_translated_once() {
        let stub = StubTranslator::new(Behavior::Tag);
        let walker = walker_with(stub.clone());
        let document = json!([
            { "title": "Desarrollador web" },
            { "title": "Desarrollador web" },
            "Desarrollador web"
        ]);

        let translated = to_english(&walker, &document).await;

        assert_eq!(translated[2], "[en] Desarrollador web");
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_leaves_keep_original_text() {
        let walker = walker_with(StubTranslator::new(Behavior::Fail(500)));
        let document = json!({ "title": "Mi Proyecto", "items": ["Uno dos tres", 4, null, true] });

        let translated = to_english(&walker, &document).await;

        assert_eq!(translated, document);
    }

    #[tokio::test]
    async fn test_key_order_is_preserved() {
        let walker = walker_with(StubTranslator::new(Behavior::Tag));
        let document: Value =
            serde_json::from_str(r#"{"zeta":"Último campo","alpha":"Primer campo","id":1}"#).unwrap();

        let translated = to_english(&walker, &document).await;

        let keys: Vec<&String> = translated.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "id"]);
    }

    #[tokio::test]
    async fn test_top_level_string_and_empty_containers() {
        let walker = walker_with(StubTranslator::new(Behavior::Tag));

        assert_eq!(to_english(&walker, &json!("Hola mundo")).await, json!("[en] Hola mundo"));
        assert_eq!(to_english(&walker, &json!({})).await, json!({}));
        assert_eq!(to_english(&walker, &json!([])).await, json!([]));
        assert_eq!(to_english(&walker, &json!(42)).await, json!(42));
    }

    #[tokio::test]
    async fn test_too_deep_document_is_refused() {
        let walker = walker_with(StubTranslator::new(Behavior::Tag)).with_max_depth(4);
        let document = json!({ "a": { "b": { "c": { "d": { "e": "Demasiado hondo" } } } } });

        let result = walker.walk(&document, Language::ENGLISH, Language::SPANISH).await;

        assert_eq!(result, Err(WalkError::TooDeep { max: 4 }));
    }

    #[test]
    fn test_normalize_media_paths() {
        let classifier = Classifier::default();
        let mut document = json!({
            "imageUrl": "proyecto.jpg",
            "coverImage": "/uploads/cover.png",
            "avatar": "https://cdn.example.com/me.png",
            "logo": "",
            "url": "github.com/someone",
            "gallery": [{ "src": "uploads/1.png" }, { "src": "data:image/png;base64,AAAA" }]
        });

        normalize_media_paths(&mut document, &classifier);

        assert_eq!(document["imageUrl"], "/proyecto.jpg");
        assert_eq!(document["coverImage"], "/uploads/cover.png");
        assert_eq!(document["avatar"], "https://cdn.example.com/me.png");
        assert_eq!(document["logo"], "");
        assert_eq!(document["url"], "github.com/someone");
        assert_eq!(document["gallery"][0]["src"], "/uploads/1.png");
        assert_eq!(document["gallery"][1]["src"], "data:image/png;base64,AAAA");
    }

    /// Replace every string with "" so only structure is compared.
    fn shape(value: &Value) -> Value {
        match value {
            Value::String(_) => Value::String(String::new()),
            Value::Array(items) => Value::Array(items.iter().map(shape).collect()),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), shape(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z áé/.:]{0,20}".prop_map(Value::String),
        ];
        leaf.prop_recursive(6, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::vec(("[a-zA-Z_]{1,10}", inner), 0..8)
                    .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_walk_preserves_shape(document in arb_json()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let walker = walker_with(StubTranslator::new(Behavior::Tag));

            let translated = runtime.block_on(to_english(&walker, &document));

            prop_assert_eq!(shape(&translated), shape(&document));
        }
    }
}
