//! Small key/value cache with a fixed time-to-live.
//!
//! Expiry is lazy: an entry past its deadline is removed by the read that
//! finds it, and that read reports a miss.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default time-to-live for entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

/// A string-keyed cache whose entries expire after a fixed TTL.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, Entry<V>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace a value, restarting its TTL.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.set_at(key, value, Instant::now());
    }

    /// Read a value, dropping it if it has expired.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Remove a single entry.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set_at(&mut self, key: impl Into<String>, value: V, now: Instant) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: now.checked_add(self.ttl),
            },
        );
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = self.entries.get(key)?.expires_at.is_some_and(|deadline| now > deadline);
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
