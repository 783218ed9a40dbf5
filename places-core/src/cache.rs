use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    address: String,
    inserted_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    /// `(key, age)` per entry, expired ones included.
    pub entries: Vec<(String, Duration)>,
}

/// Reverse-geocode results keyed by coordinates rounded to 4 decimals (~11 m).
///
/// Expiry is only checked on read; stale entries stay until overwritten or
/// [`GeocodeCache::clear`] is called.
#[derive(Debug)]
pub struct GeocodeCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl GeocodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn key(latitude: f64, longitude: f64) -> String {
        format!("{latitude:.4},{longitude:.4}")
    }

    pub fn get(&self, latitude: f64, longitude: f64) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&Self::key(latitude, longitude))
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.address.clone())
    }

    pub fn put(&self, latitude: f64, longitude: f64, address: impl Into<String>) {
        let entry = CacheEntry { address: address.into(), inserted_at: Instant::now() };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(Self::key(latitude, longitude), entry);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<(String, Duration)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.inserted_at.elapsed()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));

        CacheStats { size: entries.len(), entries: list }
    }
}
