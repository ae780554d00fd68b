use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::sync::lock;

const CACHE_DIR: &str = "hoops_zscore";
const CACHE_VERSION: u32 = 1;

/// Key/value store for serialized query results.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

impl<T: Cache + ?Sized> Cache for Box<T> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) {
        (**self).set(key, value)
    }
}

/// File cache under the app cache dir, or a memory cache when there is none.
pub fn default_cache(ttl: Duration) -> Box<dyn Cache> {
    match JsonFileCache::in_app_cache_dir(ttl) {
        Some(file) => Box::new(file),
        None => Box::new(MemoryCache::new(ttl)),
    }
}

/// Process-local cache with a fixed time-to-live.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = lock(&self.entries);
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            return Some(value.clone());
        }
        entries.remove(key);
        None
    }

    fn set(&self, key: &str, value: Value) {
        lock(&self.entries).insert(key.to_string(), (Instant::now(), value));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    entries: HashMap<String, FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    stored_at: u64,
}

/// Versioned JSON file cache, shared across process runs.
pub struct JsonFileCache {
    path: PathBuf,
    ttl: Duration,
    state: Mutex<Option<CacheFile>>,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            state: Mutex::new(None),
        }
    }

    /// `<cache dir>/hoops_zscore/query_cache.json`, when a cache dir exists.
    pub fn in_app_cache_dir(ttl: Duration) -> Option<Self> {
        app_cache_dir().map(|dir| Self::new(dir.join("query_cache.json"), ttl))
    }
}

impl Cache for JsonFileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut guard = lock(&self.state);
        let file = guard.get_or_insert_with(|| load_cache_file(&self.path));
        let entry = file.entries.get(key)?;
        let age = unix_now().saturating_sub(entry.stored_at);
        if Duration::from_secs(age) < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn set(&self, key: &str, value: Value) {
        let mut guard = lock(&self.state);
        let file = guard.get_or_insert_with(|| load_cache_file(&self.path));
        file.version = CACHE_VERSION;
        let now = unix_now();
        let ttl = self.ttl.as_secs();
        file.entries.retain(|_, e| now.saturating_sub(e.stored_at) < ttl);
        file.entries.insert(
            key.to_string(),
            FileEntry {
                value,
                stored_at: now,
            },
        );
        if let Err(err) = save_cache_file(&self.path, file) {
            warn!(path = %self.path.display(), error = %format!("{err:#}"), "query cache not saved");
        }
    }
}

fn load_cache_file(path: &Path) -> CacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return CacheFile::default();
    };
    let cache = serde_json::from_str::<CacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return CacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &CacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize query cache")?;
    fs::write(&tmp, json).context("write query cache")?;
    fs::rename(&tmp, path).context("swap query cache")?;
    Ok(())
}

/// `$XDG_CACHE_HOME/hoops_zscore`, falling back to `~/.cache/hoops_zscore`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_cache_hits_within_ttl() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        cache.set("k", json!({"a": 1}));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn memory_cache_zero_ttl_never_hits() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.set("k", json!(1));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn file_cache_survives_reopen_and_ignores_other_versions() {
        let dir = std::env::temp_dir().join(format!("hoops_zscore_cache_{}", std::process::id()));
        let path = dir.join("q.json");
        let _ = fs::remove_file(&path);

        let first = JsonFileCache::new(&path, Duration::from_secs(600));
        first.set("daily_leaders:2025-01-02:10:best", json!([1, 2, 3]));

        let second = JsonFileCache::new(&path, Duration::from_secs(600));
        assert_eq!(second.get("daily_leaders:2025-01-02:10:best"), Some(json!([1, 2, 3])));

        fs::write(&path, r#"{"version":999,"entries":{"x":{"value":1,"stored_at":0}}}"#).unwrap();
        let third = JsonFileCache::new(&path, Duration::from_secs(600));
        assert!(third.get("x").is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
