//! Short-lived cache for device profiles
//!
//! Device state changes (volumes fill up, mounts come and go), so entries
//! expire after a configurable TTL. A TTL of zero disables caching.

use ferrocopy_types::DeviceInfo;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;

/// Entries kept before expired ones are purged on insert.
const PURGE_THRESHOLD: usize = 1024;

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required probing the device
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CachedProfile {
    info: DeviceInfo,
    stored_at: Instant,
}

/// TTL cache keyed by the queried path
#[derive(Debug)]
pub struct DeviceCache {
    ttl: Duration,
    entries: RwLock<HashMap<PathBuf, CachedProfile>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DeviceCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Entry lifetime
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh profile for `path`
    pub async fn get(&self, path: &Path) -> Option<DeviceInfo> {
        if self.ttl.is_zero() {
            return None;
        }
        let entries = self.entries.read().await;
        match entries.get(path) {
            Some(cached) if cached.stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Device cache hit for {}", path.display());
                Some(cached.info.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a profile for `path`
    pub async fn insert(&self, path: PathBuf, info: DeviceInfo) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= PURGE_THRESHOLD {
            let ttl = self.ttl;
            entries.retain(|_, cached| cached.stored_at.elapsed() < ttl);
        }
        entries.insert(
            path,
            CachedProfile {
                info,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of stored entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocopy_types::DeviceType;

    fn sample() -> DeviceInfo {
        DeviceInfo::new(DeviceType::SSD, "ext4", PathBuf::from("/"))
    }

    #[tokio::test]
    async fn test_hit_and_miss() {
        let cache = DeviceCache::new(Duration::from_secs(60));
        let path = Path::new("/data/file");

        assert!(cache.get(path).await.is_none());
        cache.insert(path.to_path_buf(), sample()).await;
        assert_eq!(cache.get(path).await, Some(sample()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = DeviceCache::new(Duration::from_millis(20));
        let path = Path::new("/data/file");
        cache.insert(path.to_path_buf(), sample()).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(path).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache = DeviceCache::new(Duration::ZERO);
        cache.insert(PathBuf::from("/a"), sample()).await;
        assert!(cache.is_empty().await);
        assert!(cache.get(Path::new("/a")).await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = DeviceCache::new(Duration::from_secs(60));
        cache.insert(PathBuf::from("/a"), sample()).await;
        cache.insert(PathBuf::from("/b"), sample()).await;
        assert_eq!(cache.len().await, 2);
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
