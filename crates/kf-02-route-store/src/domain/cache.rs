//! Keyed cache with a fixed time-to-live.
//!
//! Values are stored behind `Arc` and never mutated; a writer replaces the
//! whole entry (or the whole map), so a reader holding an old `Arc` keeps a
//! consistent view.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`. An expired entry is removed and reported as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(e) if e.expires_at > now => return Some(e.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.insert_arc(key, value.clone());
        value
    }

    pub fn insert_arc(&self, key: impl Into<String>, value: Arc<V>) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Swap in a complete new set of entries in one write.
    pub fn replace_all(&self, values: impl IntoIterator<Item = (String, V)>) {
        let expires_at = Instant::now() + self.ttl;
        let fresh: HashMap<String, Entry<V>> = values
            .into_iter()
            .map(|(k, v)| {
                (
                    k,
                    Entry {
                        value: Arc::new(v),
                        expires_at,
                    },
                )
            })
            .collect();
        *self.entries.write() = fresh;
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
