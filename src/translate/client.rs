//! Retrying translation client.
//! cache check -> failure-set check -> rate-limit wait -> attempt -> validate,
//! bounded attempts, then the key goes into the failure set.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::glossary::Glossary;
use super::prompt::build_prompt;
use super::rate_limit::RateLimiter;
use super::validate::{clean_translation, Validator, MIN_TRANSLATION_CHARS};
use super::{FailurePolicy, TranslationOutcome, TranslationProvider, TranslatorConfig};
use crate::cache::ContentCache;
use crate::error::TranslateError;
use crate::metrics::{metric_names, MetricsRegistry};

pub struct TranslationClient {
    provider: Option<Arc<dyn TranslationProvider>>,
    limiter: RateLimiter,
    cache: Arc<ContentCache>,
    validator: Arc<dyn Validator>,
    glossary: Glossary,
    config: TranslatorConfig,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationClient {
    /// `provider: None` disables translation; every call falls back to the source.
    pub fn new(
        provider: Option<Arc<dyn TranslationProvider>>,
        cache: Arc<ContentCache>,
        validator: Arc<dyn Validator>,
        glossary: Glossary,
        config: TranslatorConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limit(), Arc::clone(&metrics));
        Self {
            provider,
            limiter,
            cache,
            validator,
            glossary,
            config,
            metrics,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn translate(
        &self,
        text: &str,
        item_type: &str,
        policy: FailurePolicy,
    ) -> TranslationOutcome {
        if text.chars().count() < MIN_TRANSLATION_CHARS {
            return TranslationOutcome::Fallback(text.to_string());
        }
        let Some(provider) = &self.provider else {
            return TranslationOutcome::Fallback(text.to_string());
        };

        let key = ContentCache::translation_key(item_type, text);
        if let Some(hit) = self.cache.translation(&key) {
            return TranslationOutcome::Translated(hit);
        }
        if self.cache.is_failed(&key) {
            debug!(item_type, "translation previously failed, skipping");
            return policy.on_failure(text);
        }

        let done = self.metrics.span(metric_names::TRANSLATE_DONE);
        let glossary = self.glossary.match_entries(text);
        let prompt = build_prompt(text, item_type, &glossary);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let temperature = self.config.temperature(attempt);
            let permit = self.limiter.acquire().await;

            let span = self.metrics.span(metric_names::TRANSLATE_ATTEMPT);
            let result =
                match tokio::time::timeout(self.config.timeout, provider.complete(&prompt, temperature))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TranslateError::Timeout),
                };
            span.finish();

            match result {
                Ok(raw) => {
                    let cleaned = clean_translation(&raw);
                    match self.validator.check(text, &cleaned) {
                        Ok(()) => {
                            permit.record_success();
                            self.cache.set_translation(&key, cleaned.clone());
                            let elapsed_us = done.finish();
                            info!(
                                provider = provider.name(),
                                attempt,
                                elapsed_ms = (elapsed_us / 1000.0) as u64,
                                "translation ok"
                            );
                            return TranslationOutcome::Translated(cleaned);
                        }
                        Err(rejection) => {
                            // rejected output leaves the error counter alone
                            drop(permit);
                            warn!(attempt, reason = %rejection, "translation rejected");
                            if attempt < max_attempts {
                                tokio::time::sleep(self.config.invalid_retry_delay * attempt).await;
                            }
                        }
                    }
                }
                Err(TranslateError::RateLimited { retry_after }) => {
                    permit.record_rate_limited(retry_after);
                    warn!(
                        attempt,
                        retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                        "translation rate limited"
                    );
                }
                Err(e) => {
                    permit.record_error();
                    warn!(attempt, error = %e, "translation attempt failed");
                }
            }
        }

        self.cache.mark_failed(&key);
        done.finish();
        warn!(item_type, attempts = max_attempts, "translation failed, retries exhausted");
        policy.on_failure(text)
    }
}
