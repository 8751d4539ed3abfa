//! Groq provider over the OpenAI-compatible chat/completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, retry_after, TranslationProvider};
use crate::error::TranslateError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
const MAX_TOKENS: u32 = 2048;
const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";

pub struct GroqProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqProvider {
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
}

#[async_trait]
impl TranslationProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, TranslateError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": MAX_TOKENS,
            "temperature": temperature
        });

        let resp = self
            .http
            .post(format!("{}/openai/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let hint = retry_after(resp.headers());
        if status.is_success() {
            let parsed: ChatResponse = resp
                .json()
                .await
                .map_err(|e| TranslateError::Provider(format!("bad response body: {e}")))?;
            let out = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            if out.is_empty() {
                return Err(TranslateError::EmptyResponse);
            }
            debug!(chars = out.chars().count(), "groq response");
            return Ok(out);
        }

        let text = resp.text().await.unwrap_or_default();
        let err = serde_json::from_str::<ErrorBody>(&text).ok().map(|b| b.error);
        let code = err.as_ref().and_then(|e| e.code.as_deref());
        if status.as_u16() == 429 || code == Some(RATE_LIMIT_CODE) {
            return Err(TranslateError::RateLimited { retry_after: hint });
        }
        let message = err
            .and_then(|e| e.message)
            .unwrap_or_else(|| text.chars().take(200).collect());
        Err(TranslateError::Provider(format!("{}: {}", status.as_u16(), message)))
    }
}

// --- response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/openai/v1/chat/completions";

    fn provider(server: &MockServer) -> GroqProvider {
        GroqProvider::new("gsk-test".into(), DEFAULT_MODEL.into(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("authorization", "Bearer gsk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Você pode Passar duas vezes.\n" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = provider(&server).complete("prompt", 0.2).await.unwrap();
        assert_eq!(out, "Você pode Passar duas vezes.");
    }

    #[tokio::test]
    async fn http_429_is_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached", "type": "tokens", "code": "rate_limit_exceeded" }
            })))
            .mount(&server)
            .await;

        let err = provider(&server).complete("prompt", 0.3).await.unwrap_err();
        assert!(matches!(err, TranslateError::RateLimited { retry_after: None }));
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = provider(&server).complete("prompt", 0.3).await.unwrap_err();
        assert!(matches!(err, TranslateError::Provider(msg) if msg.starts_with("503")));
    }

    #[tokio::test]
    async fn missing_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }]
            })))
            .mount(&server)
            .await;

        let err = provider(&server).complete("prompt", 0.3).await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyResponse));
    }
}
