//! Session-lifetime content cache.
//! Key: (kind, name) for resolved content, (translation, item_type:text-prefix) for
//! translated text. No TTL, no eviction: entries live until `clear()`.
//! The translation failure set lives under the same lock so `clear()` empties both at once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::content::SpellInfo;

/// Characters of source text that make up a translation key.
pub const TRANSLATION_KEY_PREFIX: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Feat,
    Spell,
    Generic,
    Translation,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Feat => write!(f, "feat"),
            ContentKind::Spell => write!(f, "spell"),
            ContentKind::Generic => write!(f, "generic"),
            ContentKind::Translation => write!(f, "translation"),
        }
    }
}

/// Cached value. `Miss` is a confirmed negative result, distinct from "never looked up".
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Miss,
    Description(String),
    Spell(SpellInfo),
    Translation(String),
}

/// Sizes reported by `/api/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub items: usize,
    pub translations: usize,
    pub failed_translations: usize,
}

type Key = (ContentKind, String);

#[derive(Default)]
struct CacheState {
    entries: HashMap<Key, CacheEntry>,
    failed: HashSet<Key>,
}

impl CacheState {
    fn stats(&self) -> CacheStats {
        let translations = self
            .entries
            .keys()
            .filter(|(kind, _)| *kind == ContentKind::Translation)
            .count();
        CacheStats {
            items: self.entries.len() - translations,
            translations,
            failed_translations: self.failed.len(),
        }
    }
}

#[derive(Default)]
pub struct ContentCache {
    inner: Mutex<CacheState>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translation cache key: `item_type:first-150-chars`.
    pub fn translation_key(item_type: &str, text: &str) -> String {
        let prefix: String = text.chars().take(TRANSLATION_KEY_PREFIX).collect();
        format!("{item_type}:{prefix}")
    }

    pub fn get(&self, kind: ContentKind, key: &str) -> Option<CacheEntry> {
        let cache = self.inner.lock();
        let hit = cache.entries.get(&(kind, key.to_string())).cloned();
        if hit.is_some() {
            debug!(kind = %kind, key = %key, "cache hit");
        }
        hit
    }

    pub fn set(&self, kind: ContentKind, key: &str, entry: CacheEntry) {
        let mut cache = self.inner.lock();
        cache.entries.insert((kind, key.to_string()), entry);
    }

    /// Cached translated text for a translation key.
    pub fn translation(&self, key: &str) -> Option<String> {
        match self.get(ContentKind::Translation, key)? {
            CacheEntry::Translation(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_translation(&self, key: &str, text: String) {
        self.set(ContentKind::Translation, key, CacheEntry::Translation(text));
    }

    /// Record that translation for `key` exhausted its retries.
    pub fn mark_failed(&self, key: &str) {
        let mut cache = self.inner.lock();
        cache.failed.insert((ContentKind::Translation, key.to_string()));
    }

    pub fn is_failed(&self, key: &str) -> bool {
        let cache = self.inner.lock();
        cache.failed.contains(&(ContentKind::Translation, key.to_string()))
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Empty every kind and the failure set. Returns the sizes before clearing.
    pub fn clear(&self) -> CacheStats {
        let mut cache = self.inner.lock();
        let before = cache.stats();
        *cache = CacheState::default();
        info!(
            items = before.items,
            translations = before.translations,
            failed = before.failed_translations,
            "cache cleared"
        );
        before
    }
}
