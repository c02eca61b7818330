use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

use super::resolve::ResolvedEntry;
use crate::config::{CacheStrategy, Config};

/// Outcome of resolving one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(ResolvedEntry),
    NotFound,
}

/// A lookup outcome together with the filter it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLookup {
    pub result: LookupResult,
    pub only_directories: bool,
}

impl CachedLookup {
    pub fn new(result: LookupResult, only_directories: bool) -> Self {
        Self {
            result,
            only_directories,
        }
    }

    /// Whether this outcome answers a lookup made with `only_directories`.
    ///
    /// Same filter always does. A found folder satisfies either filter, and
    /// a miss under no filter is also a miss for folders only.
    pub fn serves(&self, only_directories: bool) -> bool {
        if self.only_directories == only_directories {
            return true;
        }
        match &self.result {
            LookupResult::Found(entry) => entry.object.is_folder(),
            LookupResult::NotFound => !self.only_directories,
        }
    }
}

/// Holds a cached lookup and its expiration timestamp.
#[derive(Debug)]
struct TtlEntry {
    lookup: CachedLookup,
    expiry: Instant,
}

impl TtlEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expiry > now
    }
}

#[derive(Debug)]
enum Store {
    /// Unbounded map, entries expire after the TTL.
    Ttl(HashMap<String, TtlEntry>),
    /// Capacity-bounded; entries still expire after the TTL.
    Lru(LruCache<String, TtlEntry>),
    /// Caching disabled. Every `get` misses.
    None,
}

/// Path → lookup outcome cache shared by every operation on a filesystem.
///
/// Keys are normalized paths (the root is the empty string). An entry older
/// than the TTL is a miss whether or not [`purge_expired`](Self::purge_expired)
/// has run.
#[derive(Debug)]
pub struct ResolutionCache {
    store: Mutex<Store>,
    ttl: Duration,
}

impl ResolutionCache {
    pub fn new(config: &Config) -> Self {
        Self::with_strategy(
            config.cache_strategy,
            config.cache_ttl(),
            config.cache_lru_capacity,
        )
    }

    pub fn with_strategy(strategy: CacheStrategy, ttl: Duration, lru_capacity: usize) -> Self {
        let store = match strategy {
            CacheStrategy::Ttl => Store::Ttl(HashMap::new()),
            CacheStrategy::Lru => {
                let capacity = NonZeroUsize::new(lru_capacity).unwrap_or(NonZeroUsize::MIN);
                Store::Lru(LruCache::new(capacity))
            }
            CacheStrategy::None => Store::None,
        };
        Self {
            store: Mutex::new(store),
            ttl,
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live entry for `path`, dropping it if it has expired.
    ///
    /// # Arguments
    /// * `path` - Normalized path, the root being `""`.
    ///
    /// # Returns
    /// The cached lookup, or `None` on a miss, an expired entry or a
    /// disabled cache.
    pub fn get(&self, path: &str) -> Option<CachedLookup> {
        let now = Instant::now();
        let mut store = self.store();
        let found = match &mut *store {
            Store::Ttl(map) => {
                let state = map
                    .get(path)
                    .map(|entry| (entry.is_fresh(now), entry.lookup.clone()));
                match state {
                    Some((true, lookup)) => Some(lookup),
                    Some((false, _)) => {
                        trace!(path, "resolution cache expired");
                        map.remove(path);
                        None
                    }
                    None => None,
                }
            }
            Store::Lru(lru) => {
                let state = lru
                    .get(path)
                    .map(|entry| (entry.is_fresh(now), entry.lookup.clone()));
                match state {
                    Some((true, lookup)) => Some(lookup),
                    Some((false, _)) => {
                        trace!(path, "resolution cache expired");
                        lru.pop(path);
                        None
                    }
                    None => None,
                }
            }
            Store::None => None,
        };
        if found.is_some() {
            trace!(path, "resolution cache hit");
        } else {
            trace!(path, "resolution cache miss");
        }
        found
    }

    /// Inserts or replaces the entry for `path` with a fresh TTL.
    ///
    /// # Arguments
    /// * `path` - Normalized path.
    /// * `lookup` - Outcome to remember, tagged with its filter.
    pub fn set(&self, path: &str, lookup: CachedLookup) {
        let entry = TtlEntry {
            lookup,
            expiry: Instant::now() + self.ttl,
        };
        match &mut *self.store() {
            Store::Ttl(map) => {
                map.insert(path.to_string(), entry);
            }
            Store::Lru(lru) => {
                lru.put(path.to_string(), entry);
            }
            Store::None => {}
        }
    }

    /// Forgets `path` only. Entries below it are left alone.
    pub fn delete(&self, path: &str) {
        match &mut *self.store() {
            Store::Ttl(map) => {
                map.remove(path);
            }
            Store::Lru(lru) => {
                lru.pop(path);
            }
            Store::None => {}
        }
    }

    /// Removes every entry strictly below `path`.
    pub fn delete_descendants(&self, path: &str) {
        let prefix = format!("{path}/");
        match &mut *self.store() {
            Store::Ttl(map) => map.retain(|key, _| !key.starts_with(&prefix)),
            Store::Lru(lru) => {
                let doomed: Vec<String> = lru
                    .iter()
                    .filter(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in doomed {
                    lru.pop(&key);
                }
            }
            Store::None => {}
        }
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match &mut *self.store() {
            Store::Ttl(map) => {
                let before = map.len();
                map.retain(|_, entry| entry.is_fresh(now));
                before - map.len()
            }
            Store::Lru(lru) => {
                let expired: Vec<String> = lru
                    .iter()
                    .filter(|(_, entry)| !entry.is_fresh(now))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &expired {
                    lru.pop(key);
                }
                expired.len()
            }
            Store::None => 0,
        }
    }

    pub fn len(&self) -> usize {
        match &*self.store() {
            Store::Ttl(map) => map.len(),
            Store::Lru(lru) => lru.len(),
            Store::None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
