use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::i18n::Language;

/// Errors from the external translation service.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,

    #[error("failed to send translation request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("OpenAI API error during translation ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse translation response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("translation response contained no text")]
    Empty,
}

impl TranslateError {
    /// 429 and 5xx are transient, as are network and parse failures.
    /// Other 4xx and a missing key will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::MissingApiKey => false,
            TranslateError::Api { status, .. } => *status == 429 || *status >= 500,
            TranslateError::Request(_) | TranslateError::Parse(_) | TranslateError::Empty => true,
        }
    }
}

/// The external text-translation capability.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target: Language,
        source: Language,
    ) -> Result<String, TranslateError>;
}

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Output budget grows with the input: roughly one token per two characters plus headroom.
fn max_tokens_for(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars / 2 + 64).min(4096)
}

fn build_translation_system_prompt(source: &str, target: &str) -> String {
    format!(
        r#"You are a professional translator for a personal portfolio website. Translate the user's text from {} to {}.

Rules:
- Return ONLY the translated text, with no quotes, notes or explanations
- Keep proper names of people, companies, products and technologies unchanged (e.g., React, Node.js, PostgreSQL)
- Keep URLs, email addresses, code and file names unchanged
- Preserve markdown, HTML tags, line breaks and emojis exactly
- If the text is already in {} or cannot be translated, return it unchanged"#,
        source, target, target
    )
}

/// OpenAI-compatible chat completion translator.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl OpenAiTranslator {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        model: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            api_url: api_url.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        Self::new(
            client,
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_api_url.clone(),
        )
    }

    fn build_request(&self, text: &str, target: Language, source: Language) -> TranslationRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);

        TranslationRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_translation_system_prompt(source.name(), target.name()),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            max_completion_tokens: if is_reasoning { 16000 } else { max_tokens_for(text) },
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: is_reasoning.then(|| "low".to_string()),
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        target: Language,
        source: Language,
    ) -> Result<String, TranslateError> {
        let api_key = self.api_key.as_deref().ok_or(TranslateError::MissingApiKey)?;
        let request = self.build_request(text, target, source);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(TranslateError::Request)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslateError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await.map_err(TranslateError::Parse)?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(TranslateError::Empty)
    }
}
