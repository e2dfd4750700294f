//! Time-bounded key/value cache shared between the prefetch scheduler and
//! request handlers. Values are stored behind `Arc` so a `set` swaps the
//! whole entry while readers keep whatever snapshot they already hold.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::model::NewsItem;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

pub struct TtlCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    max_entries: Option<usize>,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

/// Prefetched items per category, keyed by [`category_key`].
pub type CategoryCache = TtlCache<Vec<NewsItem>>;

pub fn category_key(category: &str) -> String {
    format!("category_{}", category)
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            max_entries: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Bound the number of stored entries. Inserting a new key into a full
    /// cache drops expired entries first, then the one closest to expiry.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub fn set(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let key = key.into();
        let value = Arc::new(value);
        let now = self.clock.now();
        let entry = Entry {
            value: Arc::clone(&value),
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                make_room(&mut entries, max, now);
            }
        }
        entries.insert(key, entry);
        value
    }

    /// Returns whether a live or expired entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).is_some()
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn make_room<V>(entries: &mut HashMap<String, Entry<V>>, max: usize, now: Instant) {
    entries.retain(|_, entry| entry.expires_at > now);
    while entries.len() >= max {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                entries.remove(&key);
            }
            None => break,
        }
    }
}
