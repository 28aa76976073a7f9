//! File-backed JSON cache with per-key freshness.
//!
//! Keys map onto paths under the cache root: `heroes` → `heroes.json`,
//! `counters:Anti-Mage` → `counters/Anti-Mage.json`. Freshness comes from the
//! blob's mtime, so a cache directory copied between machines keeps its age.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// A loaded blob and whether it is still within its TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub fresh: bool,
}

#[derive(Debug, Clone)]
pub struct FreshnessCache {
    root: PathBuf,
}

impl FreshnessCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        let segments: Vec<String> = key.split(':').map(sanitize_segment).collect();
        if let Some((last, dirs)) = segments.split_last() {
            for dir in dirs {
                path.push(dir);
            }
            path.push(format!("{last}.json"));
        }
        path
    }

    /// `Ok(None)` when nothing has been stored under `key`.
    /// `ttl = None` means the blob never goes stale.
    pub fn load<T: DeserializeOwned>(&self, key: &str, ttl: Option<Duration>) -> Result<Option<Cached<T>>> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read cache {}", path.display())),
        };

        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("stat cache {}", path.display()))?;

        let value = serde_json::from_str(&raw)
            .with_context(|| format!("parse cache {}", path.display()))?;

        Ok(Some(Cached {
            value,
            fresh: is_fresh(modified, SystemTime::now(), ttl),
        }))
    }

    /// Overwrites any previous blob. The write goes through a temp file and a
    /// rename, so a concurrent `load` sees either the old or the new blob.
    pub fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }

        let json = serde_json::to_string(value).context("serialize cache value")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }

    /// Serves the cached value while fresh, otherwise runs `refresh`, stores
    /// its output and returns it. A failed refresh is returned as-is; a stale
    /// blob is never used as a fallback.
    pub async fn get_or_refresh<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, refresh: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.load::<T>(key, ttl) {
            Ok(Some(Cached { value, fresh: true })) => {
                debug!(key, "cache hit");
                return Ok(value);
            }
            Ok(Some(_)) => info!(key, "cache stale, refreshing"),
            Ok(None) => info!(key, "cache miss, fetching"),
            Err(e) => warn!(key, "unreadable cache entry, refetching: {:#}", e),
        }

        let value = refresh().await.with_context(|| format!("refresh {key}"))?;
        self.store(key, &value)?;
        Ok(value)
    }
}

pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Option<Duration>) -> bool {
    match ttl {
        None => true,
        // mtime in the future (clock skew) counts as just written
        Some(ttl) => now.duration_since(modified).map_or(true, |age| age <= ttl),
    }
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '\'') { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}
