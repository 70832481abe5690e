//! Device profiling
//!
//! [`DeviceProfiler::profile`] classifies the device backing a path and
//! reports its capacity and theoretical throughput. It is a pure query: the
//! only state it keeps is a short-lived cache.

use crate::cache::{CacheStats, DeviceCache};
use ferrocopy_types::{DeviceInfo, Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cache lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Classifies storage devices
#[derive(Debug)]
pub struct DeviceProfiler {
    cache: DeviceCache,
}

impl DeviceProfiler {
    /// Create a profiler with the default cache lifetime
    pub fn new() -> Self {
        Self::with_cache_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create a profiler whose cached profiles live for `ttl`
    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self {
            cache: DeviceCache::new(ttl),
        }
    }

    /// Profile the device containing `path`.
    ///
    /// Fails with `InvalidPath` when the path is empty or does not exist.
    /// Permission problems never fail the query: the result is an `Unknown`
    /// device with zeroed capacity.
    pub async fn profile(&self, path: impl AsRef<Path>) -> Result<DeviceInfo> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_path(path, "path is empty"));
        }

        match tokio::fs::metadata(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::invalid_path(path, "path does not exist"));
            }
            Err(e) => {
                warn!("Cannot inspect {}: {}", path.display(), e);
                return Ok(DeviceInfo::unknown(path.to_path_buf()));
            }
        }

        if let Some(info) = self.cache.get(path).await {
            return Ok(info);
        }

        let info = probe(path).await;
        self.cache.insert(path.to_path_buf(), info.clone()).await;
        Ok(info)
    }

    /// Profile the closest existing ancestor of `path`.
    ///
    /// Used for destinations that are about to be created.
    pub async fn profile_nearest(&self, path: impl AsRef<Path>) -> Result<DeviceInfo> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_path(path, "path is empty"));
        }
        let anchor = nearest_existing(path)
            .await
            .ok_or_else(|| Error::invalid_path(path, "no existing ancestor"))?;
        if anchor != path {
            debug!("Profiling {} in place of {}", anchor.display(), path.display());
        }
        self.profile(anchor).await
    }

    /// Drop every cached profile
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Cache hit/miss counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for DeviceProfiler {
    fn default() -> Self {
        Self::new()
    }
}

async fn nearest_existing(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    for candidate in absolute.ancestors() {
        if tokio::fs::symlink_metadata(candidate).await.is_ok() {
            return Some(candidate.to_path_buf());
        }
    }
    None
}

#[cfg(unix)]
async fn probe(path: &Path) -> DeviceInfo {
    crate::unix::probe(path).await
}

#[cfg(windows)]
async fn probe(path: &Path) -> DeviceInfo {
    crate::windows::probe(path).await
}

#[cfg(not(any(unix, windows)))]
async fn probe(path: &Path) -> DeviceInfo {
    DeviceInfo::unknown(path.to_path_buf())
}
