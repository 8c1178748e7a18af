use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Thread-safe TTL cache for market data responses.
///
/// Expired entries are evicted on read; `purge_expired` sweeps the rest.
pub struct Cache<V> {
    entries: DashMap<String, Stamped<V>>,
    ttl: Duration,
}

struct Stamped<V> {
    value: V,
    stored_at: Instant,
}

impl<V: Clone> Cache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries
            .remove_if(key, |_, stamped| stamped.stored_at.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            Stamped {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, stamped| stamped.stored_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Entry count, including expired entries not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
