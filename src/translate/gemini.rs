//! Google Gemini `generateContent` provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, retry_after, TranslationProvider};
use crate::error::TranslateError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const MAX_OUTPUT_TOKENS: u32 = 1024;
/// Status string Google uses for quota and rate-limit errors.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, TranslateError> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TranslationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, TranslateError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        });

        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let hint = retry_after(resp.headers());
        let text = resp.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&text).unwrap_or_default();

        if let Some(err) = parsed.error {
            if status.as_u16() == 429 || err.status.as_deref() == Some(RESOURCE_EXHAUSTED) {
                return Err(TranslateError::RateLimited { retry_after: hint });
            }
            return Err(TranslateError::Provider(format!(
                "{}: {}",
                status.as_u16(),
                err.message.unwrap_or_default()
            )));
        }
        if status.as_u16() == 429 {
            return Err(TranslateError::RateLimited { retry_after: hint });
        }
        if !status.is_success() {
            return Err(TranslateError::Provider(format!(
                "unexpected status {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let out = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if out.is_empty() {
            return Err(TranslateError::EmptyResponse);
        }
        debug!(chars = out.chars().count(), "gemini response");
        Ok(out)
    }
}

// --- response types ---

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}
