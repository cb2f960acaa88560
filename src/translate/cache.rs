// src/translate/cache.rs
//! Bounded LRU memo of translation results.
//!
//! Insertion order of the `IndexMap` doubles as recency order: index 0 is the
//! least recently used entry, the tail is the most recent.

use indexmap::IndexMap;

pub const DEFAULT_CACHE_ENTRIES: usize = 2048;

/// `(provider, endpoint, source_lang, target_lang, text)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub endpoint: String,
    pub source_lang: String,
    pub target_lang: String,
    pub text: String,
}

impl CacheKey {
    pub fn new(provider: &str, endpoint: &str, source_lang: &str, target_lang: &str, text: &str) -> Self {
        Self {
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct TranslationCache {
    max_entries: usize,
    data: IndexMap<CacheKey, String>,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl TranslationCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            data: IndexMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Change capacity, evicting the oldest entries right away if needed.
    pub fn resize(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        self.evict_excess();
    }

    /// Lookup that refreshes the entry's recency.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let (k, v) = self.data.shift_remove_entry(key)?;
        self.data.insert(k, v.clone());
        Some(v)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.data.contains_key(key)
    }

    /// Insert or refresh. A zero-capacity cache stores nothing.
    pub fn insert(&mut self, key: CacheKey, value: String) {
        if self.max_entries == 0 {
            return;
        }
        self.data.shift_remove(&key);
        self.data.insert(key, value);
        self.evict_excess();
    }

    fn evict_excess(&mut self) {
        while self.data.len() > self.max_entries {
            self.data.shift_remove_index(0);
        }
    }
}
