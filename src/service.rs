//! Lookup façade: cache check, resolve, normalize, translate, cache write.
//! One entry point per content kind; the web layer only maps these to JSON.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::cache::{CacheEntry, CacheStats, ContentCache, ContentKind};
use crate::content::normalize::normalize;
use crate::content::{ContentResolver, SpellInfo, CATEGORY_FEAT, CATEGORY_SPELL};
use crate::error::LookupError;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::translate::{
    FailurePolicy, TranslationClient, ITEM_FEAT, ITEM_GENERIC, ITEM_SPELL,
};

/// Description length limits per kind, in characters.
pub const FEAT_MAX_CHARS: usize = 400;
pub const SPELL_MAX_CHARS: usize = 400;
pub const GENERIC_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub ok: bool,
    pub has_api_key: bool,
    pub cache_size: usize,
    pub translation_cache_size: usize,
    pub failed_translations: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Cleared {
    pub cleared: bool,
    pub items: usize,
    pub translations: usize,
}

pub struct LookupService {
    resolver: ContentResolver,
    translator: Arc<TranslationClient>,
    cache: Arc<ContentCache>,
    metrics: Arc<MetricsRegistry>,
    policy: FailurePolicy,
}

impl LookupService {
    pub fn new(
        resolver: ContentResolver,
        translator: TranslationClient,
        cache: Arc<ContentCache>,
        metrics: Arc<MetricsRegistry>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            resolver,
            translator: Arc::new(translator),
            cache,
            metrics,
            policy,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Feat description, translated when a provider is configured.
    pub async fn lookup_feat(&self, name: &str) -> Result<Option<String>, LookupError> {
        self.lookup_description(
            ContentKind::Feat,
            name,
            Some(CATEGORY_FEAT),
            ITEM_FEAT,
            FEAT_MAX_CHARS,
        )
        .await
    }

    /// Any content kind; no category filter.
    pub async fn lookup_generic(&self, name: &str) -> Result<Option<String>, LookupError> {
        self.lookup_description(ContentKind::Generic, name, None, ITEM_GENERIC, GENERIC_MAX_CHARS)
            .await
    }

    /// Structured spell details. `Ok(None)` when the index has no such spell.
    pub async fn lookup_spell(&self, name: &str) -> Result<Option<SpellInfo>, LookupError> {
        match self.cache.get(ContentKind::Spell, name) {
            Some(CacheEntry::Spell(info)) => return Ok(Some(info)),
            Some(CacheEntry::Miss) => return Ok(None),
            _ => {}
        }

        let span = self.metrics.span(metric_names::REQUEST);
        let Some(record) = self.resolver.resolve(name, Some(CATEGORY_SPELL)).await? else {
            self.cache.set(ContentKind::Spell, name, CacheEntry::Miss);
            span.finish();
            return Ok(None);
        };

        let english = normalize(record.raw_body(), Some(SPELL_MAX_CHARS));
        let mut info = SpellInfo::from_record(name, &record, &english);
        if !english.is_empty() {
            info.description = self.translate(&english, ITEM_SPELL).await;
        }
        info!(
            name = %name,
            actions = ?info.actions,
            traits = info.traits.as_ref().map_or(0, Vec::len),
            "spell found"
        );

        self.cache
            .set(ContentKind::Spell, name, CacheEntry::Spell(info.clone()));
        span.finish();
        Ok(Some(info))
    }

    async fn lookup_description(
        &self,
        kind: ContentKind,
        name: &str,
        category: Option<&str>,
        item_type: &'static str,
        max_len: usize,
    ) -> Result<Option<String>, LookupError> {
        match self.cache.get(kind, name) {
            Some(CacheEntry::Description(text)) => return Ok(Some(text)),
            Some(CacheEntry::Miss) => return Ok(None),
            _ => {}
        }

        let span = self.metrics.span(metric_names::REQUEST);
        let Some(record) = self.resolver.resolve(name, category).await? else {
            self.cache.set(kind, name, CacheEntry::Miss);
            span.finish();
            return Ok(None);
        };

        let english = normalize(record.raw_body(), Some(max_len));
        if english.is_empty() {
            debug!(kind = %kind, name = %name, "record has no description text");
            self.cache.set(kind, name, CacheEntry::Miss);
            span.finish();
            return Ok(None);
        }

        let description = self.translate(&english, item_type).await;
        // explicit failures stay uncached so a later clear() can retry them
        if let Some(text) = &description {
            self.cache
                .set(kind, name, CacheEntry::Description(text.clone()));
        }
        span.finish();
        Ok(description)
    }

    /// The attempt runs on its own task, so a caller that goes away mid-request
    /// does not cancel the provider call. Cache, FailureSet and limiter still
    /// see its outcome.
    async fn translate(&self, english: &str, item_type: &'static str) -> Option<String> {
        let translator = Arc::clone(&self.translator);
        let policy = self.policy;
        let text = english.to_string();
        let attempt = tokio::spawn(
            async move { translator.translate(&text, item_type, policy).await }.in_current_span(),
        );
        match attempt.await {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                warn!(error = %e, item_type, "translation task aborted");
                policy.on_failure(english).into_text()
            }
        }
    }

    pub fn health(&self) -> Health {
        let CacheStats {
            items,
            translations,
            failed_translations,
        } = self.cache.stats();
        Health {
            status: "ok",
            ok: true,
            has_api_key: self.translator.has_provider(),
            cache_size: items,
            translation_cache_size: translations,
            failed_translations,
        }
    }

    /// Empty the content cache and the translation failure set.
    pub fn clear_cache(&self) -> Cleared {
        let before = self.cache.clear();
        Cleared {
            cleared: true,
            items: before.items,
            translations: before.translations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentRecord, SearchIndex};
    use crate::error::{ResolveError, TranslateError};
    use crate::translate::{Glossary, HeuristicValidator, TranslationProvider, TranslatorConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    const DODGE_TEXT: &str =
        "You dodge a single incoming attack, gaining a +2 circumstance bonus to AC.";
    const DODGE_PT: &str =
        "Você se esquiva de um único ataque, recebendo um bônus de circunstância de +2 na CA.";

    /// In-memory index that counts searches.
    struct FakeIndex {
        records: Vec<ContentRecord>,
        fail: bool,
        searches: Mutex<usize>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn search(
            &self,
            _name: &str,
            _category: Option<&str>,
        ) -> Result<Vec<ContentRecord>, ResolveError> {
            *self.searches.lock() += 1;
            if self.fail {
                return Err(ResolveError::Status(502));
            }
            Ok(self.records.clone())
        }
    }

    /// Answers every prompt with the same reply after `delay`.
    struct FixedProvider {
        reply: Result<String, TranslateError>,
        delay: Duration,
        calls: Mutex<usize>,
    }

    impl FixedProvider {
        fn new(reply: Result<String, TranslateError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply,
                delay,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl TranslationProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, TranslateError> {
            *self.calls.lock() += 1;
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn record(name: &str, category: &str, text: &str) -> ContentRecord {
        ContentRecord {
            name: name.into(),
            category: Some(category.into()),
            text: Some(text.into()),
            ..ContentRecord::default()
        }
    }

    fn service(records: Vec<ContentRecord>, fail: bool) -> (LookupService, Arc<FakeIndex>) {
        service_with(records, fail, None, FailurePolicy::FallbackToSource)
    }

    fn service_with(
        records: Vec<ContentRecord>,
        fail: bool,
        provider: Option<Arc<FixedProvider>>,
        policy: FailurePolicy,
    ) -> (LookupService, Arc<FakeIndex>) {
        let index = Arc::new(FakeIndex {
            records,
            fail,
            searches: Mutex::new(0),
        });
        let metrics = Arc::new(MetricsRegistry::new());
        let cache = Arc::new(ContentCache::new());
        let translator = TranslationClient::new(
            provider.map(|p| p as Arc<dyn TranslationProvider>),
            Arc::clone(&cache),
            Arc::new(HeuristicValidator::default()),
            Glossary::builtin(),
            TranslatorConfig::default(),
            Arc::clone(&metrics),
        );
        let resolver = ContentResolver::new(Arc::clone(&index) as Arc<dyn SearchIndex>, Arc::clone(&metrics));
        let svc = LookupService::new(resolver, translator, cache, metrics, policy);
        (svc, index)
    }

    #[tokio::test]
    async fn feat_is_normalized_and_cached() {
        let (svc, index) = service(
            vec![record("Power Attack", "feat", "<p>You make a <b>powerful</b> Strike. Source Core Rulebook pg. 142.</p>")],
            false,
        );

        let first = svc.lookup_feat("Power Attack").await.unwrap();
        assert_eq!(first.as_deref(), Some("You make a powerful Strike."));
        let second = svc.lookup_feat("Power Attack").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(*index.searches.lock(), 1);
        assert_eq!(svc.health().cache_size, 1);
    }

    #[tokio::test]
    async fn miss_is_cached_as_negative() {
        let (svc, index) = service(vec![record("Fireball", "spell", "Boom.")], false);

        assert_eq!(svc.lookup_feat("Fireball").await.unwrap(), None);
        assert_eq!(svc.lookup_feat("Fireball").await.unwrap(), None);
        assert_eq!(*index.searches.lock(), 1);
    }

    #[tokio::test]
    async fn index_failure_is_not_cached() {
        let (svc, index) = service(Vec::new(), true);

        assert!(svc.lookup_generic("Anything").await.is_err());
        assert!(svc.lookup_generic("Anything").await.is_err());
        assert_eq!(*index.searches.lock(), 2);
        assert_eq!(svc.health().cache_size, 0);
    }

    #[tokio::test]
    async fn spell_carries_structured_fields() {
        let mut fireball = record(
            "Fireball",
            "spell",
            "A roaring blast of fire deals 6d6 fire damage. Heightened (+1) The damage increases by 2d6.",
        );
        fireball.actions = Some("Two Actions".into());
        fireball.traits = ["fire", "evocation", "a", "b", "c", "d", "e"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        fireball.range = Some("500 feet".into());
        let (svc, _) = service(vec![fireball], false);

        let info = svc.lookup_spell("fireball").await.unwrap().unwrap();
        assert_eq!(info.name, "fireball");
        assert_eq!(info.actions.as_deref(), Some("2"));
        assert_eq!(info.traits.as_ref().map(Vec::len), Some(6));
        assert_eq!(info.range.as_deref(), Some("500 feet"));
        assert_eq!(info.damage.as_deref(), Some("6d6"));
        assert!(info.description.is_some());
        assert!(info.heightened.is_some());
    }

    #[tokio::test]
    async fn clear_reports_and_empties() {
        let (svc, index) = service(vec![record("Dodge", "feat", "You dodge an attack.")], false);
        svc.lookup_feat("Dodge").await.unwrap();

        let cleared = svc.clear_cache();
        assert_eq!(cleared, Cleared { cleared: true, items: 1, translations: 0 });
        svc.lookup_feat("Dodge").await.unwrap();
        assert_eq!(*index.searches.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lookup_still_finishes_translation() {
        let provider = FixedProvider::new(Ok(DODGE_PT.into()), Duration::from_secs(2));
        let (svc, _) = service_with(
            vec![record("Dodge", "feat", DODGE_TEXT)],
            false,
            Some(Arc::clone(&provider)),
            FailurePolicy::FallbackToSource,
        );

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), svc.lookup_feat("Dodge")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(provider.calls(), 1);
        let health = svc.health();
        assert_eq!(health.translation_cache_size, 1);
        assert_eq!(health.failed_translations, 0);

        let again = svc.lookup_feat("Dodge").await.unwrap();
        assert_eq!(again.as_deref(), Some(DODGE_PT));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_failure_yields_none_and_skips_provider_next_time() {
        let provider = FixedProvider::new(
            Err(TranslateError::Transport("connection reset".into())),
            Duration::ZERO,
        );
        let (svc, index) = service_with(
            vec![record("Dodge", "feat", DODGE_TEXT)],
            false,
            Some(Arc::clone(&provider)),
            FailurePolicy::Explicit,
        );

        assert_eq!(svc.lookup_feat("Dodge").await.unwrap(), None);
        assert_eq!(provider.calls(), 3);
        let health = svc.health();
        assert_eq!(health.cache_size, 0);
        assert_eq!(health.failed_translations, 1);

        assert_eq!(svc.lookup_feat("Dodge").await.unwrap(), None);
        assert_eq!(provider.calls(), 3);
        assert_eq!(*index.searches.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_failure_caches_english() {
        let provider = FixedProvider::new(
            Err(TranslateError::Transport("connection reset".into())),
            Duration::ZERO,
        );
        let (svc, index) = service_with(
            vec![record("Dodge", "feat", DODGE_TEXT)],
            false,
            Some(Arc::clone(&provider)),
            FailurePolicy::FallbackToSource,
        );

        assert_eq!(svc.lookup_feat("Dodge").await.unwrap().as_deref(), Some(DODGE_TEXT));
        assert_eq!(svc.lookup_feat("Dodge").await.unwrap().as_deref(), Some(DODGE_TEXT));
        assert_eq!(provider.calls(), 3);
        assert_eq!(*index.searches.lock(), 1);
    }

    #[test]
    fn health_reports_missing_provider() {
        let (svc, _) = service(Vec::new(), false);
        let health = svc.health();
        assert_eq!(health.status, "ok");
        assert!(health.ok);
        assert!(!health.has_api_key);
    }
}
