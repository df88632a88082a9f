//! Bounded cache of compiled regular expressions.
//!
//! Keys are content-addressed (pattern text and case folding), with text and
//! byte regexes in separate maps. Sharing one cache across threads and
//! predicates never changes a verdict, only how often a pattern is compiled.

use crate::config::PatternCacheConfig;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct PatternKey {
    pattern: String,
    case_insensitive: bool,
}

#[derive(Clone, Debug)]
struct CacheEntry<T> {
    compiled: T,
    last_accessed: u64,
}

type Entries<T> = HashMap<PatternKey, CacheEntry<T>>;

/// Metrics for cache performance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub size: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    text: Entries<Arc<Regex>>,
    bytes: Entries<Arc<regex::bytes::Regex>>,
    metrics: CacheMetrics,
    clock: u64,
}

impl CacheState {
    fn len(&self) -> usize {
        self.text.len() + self.bytes.len()
    }

    fn text(&mut self) -> &mut Entries<Arc<Regex>> {
        &mut self.text
    }

    fn bytes(&mut self) -> &mut Entries<Arc<regex::bytes::Regex>> {
        &mut self.bytes
    }
}

/// Compiled pattern cache shared by the operator evaluators and the normalizer.
#[derive(Debug)]
pub struct PatternCache {
    config: PatternCacheConfig,
    state: RwLock<CacheState>,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(PatternCacheConfig::default())
    }
}

impl PatternCache {
    pub fn new(config: PatternCacheConfig) -> Self {
        debug!(
            "Creating pattern cache: enabled={}, max_size={}",
            config.enabled, config.max_size
        );
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Compile (or fetch) a text regex.
    pub fn text(&self, pattern: &str, case_sensitive: bool) -> Result<Arc<Regex>, regex::Error> {
        let key = PatternKey {
            pattern: pattern.to_string(),
            case_insensitive: !case_sensitive,
        };
        self.get_or_compile(key, CacheState::text, || {
            RegexBuilder::new(pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map(Arc::new)
        })
    }

    /// Compile (or fetch) a regex that runs over raw bytes.
    pub fn bytes(
        &self,
        pattern: &str,
        case_sensitive: bool,
    ) -> Result<Arc<regex::bytes::Regex>, regex::Error> {
        let key = PatternKey {
            pattern: pattern.to_string(),
            case_insensitive: !case_sensitive,
        };
        self.get_or_compile(key, CacheState::bytes, || {
            regex::bytes::RegexBuilder::new(pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map(Arc::new)
        })
    }

    fn get_or_compile<T, F>(
        &self,
        key: PatternKey,
        entries: fn(&mut CacheState) -> &mut Entries<T>,
        compile: F,
    ) -> Result<T, regex::Error>
    where
        T: Clone,
        F: FnOnce() -> Result<T, regex::Error>,
    {
        if !self.config.enabled {
            return compile();
        }

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            state.clock += 1;
            let tick = state.clock;
            if let Some(entry) = entries(state).get_mut(&key) {
                entry.last_accessed = tick;
                let compiled = entry.compiled.clone();
                state.metrics.hits += 1;
                trace!("Pattern cache hit for {:?}", key.pattern);
                return Ok(compiled);
            }
            state.metrics.misses += 1;
        }

        // Compile outside the lock; a racing thread may compile the same pattern,
        // which only costs a duplicate insert.
        trace!("Pattern cache miss for {:?}", key.pattern);
        let compiled = compile()?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.len() >= self.config.max_size && !entries(state).contains_key(&key) {
            Self::evict_lru(state);
        }
        let tick = state.clock;
        entries(state).insert(
            key,
            CacheEntry {
                compiled: compiled.clone(),
                last_accessed: tick,
            },
        );
        state.metrics.inserts += 1;
        state.metrics.size = state.len();
        Ok(compiled)
    }

    /// Evict the least recently used pattern across both maps.
    fn evict_lru(state: &mut CacheState) {
        let evicted = match (oldest(&state.text), oldest(&state.bytes)) {
            (Some((text, text_tick)), Some((_, bytes_tick))) if text_tick <= bytes_tick => {
                state.text.remove(&text).map(|_| text)
            }
            (_, Some((bytes, _))) => state.bytes.remove(&bytes).map(|_| bytes),
            (Some((text, _)), None) => state.text.remove(&text).map(|_| text),
            (None, None) => None,
        };
        if let Some(key) = evicted {
            state.metrics.evictions += 1;
            trace!("Evicted LRU pattern: {:?}", key.pattern);
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.text.clear();
        state.bytes.clear();
        state.metrics.size = 0;
        debug!("Pattern cache cleared");
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.read().metrics.clone()
    }

    pub fn size(&self) -> usize {
        self.state.read().len()
    }
}

fn oldest<T>(entries: &Entries<T>) -> Option<(PatternKey, u64)> {
    entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_accessed)
        .map(|(key, entry)| (key.clone(), entry.last_accessed))
}
