//! Translation side of the pipeline.
//! Provider adapters (Gemini, Groq), the shared rate limiter, output
//! validation, and the retrying client that ties them to the content cache.

pub mod client;
pub mod gemini;
pub mod glossary;
pub mod groq;
pub mod prompt;
pub mod rate_limit;
pub mod validate;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TranslateError;

pub use client::TranslationClient;
pub use gemini::GeminiProvider;
pub use glossary::{Glossary, GlossaryEntry};
pub use groq::GroqProvider;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use validate::{HeuristicValidator, LanguageDetectValidator, Validator};

/// Item-type labels shown to the provider.
pub const ITEM_FEAT: &str = "talento (feat)";
pub const ITEM_SPELL: &str = "magia (spell)";
pub const ITEM_GENERIC: &str = "habilidade especial de classe";

/// Result of one `translate` call. Callers pick how to handle each case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Validated provider output (fresh or cached).
    Translated(String),
    /// Source text returned unchanged: too short, translation disabled,
    /// or failed under `FailurePolicy::FallbackToSource`.
    Fallback(String),
    /// Failed under `FailurePolicy::Explicit`.
    Failed,
}

impl TranslationOutcome {
    pub fn is_translated(&self) -> bool {
        matches!(self, TranslationOutcome::Translated(_))
    }

    /// Usable description text, if any.
    pub fn into_text(self) -> Option<String> {
        match self {
            TranslationOutcome::Translated(text) | TranslationOutcome::Fallback(text) => Some(text),
            TranslationOutcome::Failed => None,
        }
    }
}

/// What a caller wants back when translation cannot succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    FallbackToSource,
    Explicit,
}

impl FailurePolicy {
    pub fn on_failure(self, source: &str) -> TranslationOutcome {
        match self {
            FailurePolicy::FallbackToSource => TranslationOutcome::Fallback(source.to_string()),
            FailurePolicy::Explicit => TranslationOutcome::Failed,
        }
    }
}

/// A text-generation backend that turns a prompt into translated text.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, TranslateError>;
}

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Minimum spacing between provider calls.
    pub base_delay: Duration,
    pub max_attempts: u32,
    /// Per-attempt deadline; expiry counts as a transport error.
    pub timeout: Duration,
    /// Pause after an explicit rate-limit signal without Retry-After.
    pub rate_limit_cooldown: Duration,
    /// Delay after a rejected output, multiplied by the attempt number.
    pub invalid_retry_delay: Duration,
    /// Generation temperature per attempt; the last value repeats.
    pub temperatures: Vec<f32>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(4000),
            max_attempts: 3,
            timeout: Duration::from_secs(15),
            rate_limit_cooldown: Duration::from_secs(30),
            invalid_retry_delay: Duration::from_secs(1),
            temperatures: vec![0.3, 0.2, 0.1],
        }
    }
}

impl TranslatorConfig {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            base_delay: self.base_delay,
            rate_limit_cooldown: self.rate_limit_cooldown,
            ..RateLimitConfig::default()
        }
    }

    /// Temperature for a 1-based attempt number.
    pub fn temperature(&self, attempt: u32) -> f32 {
        let idx = attempt.saturating_sub(1) as usize;
        self.temperatures
            .get(idx)
            .or_else(|| self.temperatures.last())
            .copied()
            .unwrap_or(0.3)
    }
}

/// `Retry-After` in seconds, when the provider sent one.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Shared HTTP client settings for the provider adapters.
fn http_client(timeout: Duration) -> Result<reqwest::Client, TranslateError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
        .map_err(|e| TranslateError::Transport(e.to_string()))
}
