//! In-memory response caches with an injectable clock.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// Source of "now" for cache freshness checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, inserted_at: DateTime<Utc>) -> Self {
        Self { value, inserted_at }
    }

    /// An entry is fresh while its age is strictly below `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.inserted_at >= ttl
    }
}

/// String-keyed cache. With `ttl == None` entries never expire.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, clock }
    }

    /// Cache that keeps entries for the lifetime of the process.
    pub fn permanent() -> Self {
        Self::new(None, Arc::new(SystemClock))
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        match self.ttl {
            Some(ttl) if entry.is_expired(self.clock.now(), ttl) => {
                tracing::debug!(key, "cache entry expired");
                None
            }
            _ => Some(entry.value.clone()),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry::new(value, self.clock.now());
        self.entries.lock().insert(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
