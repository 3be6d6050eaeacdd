//! On-disk route caches.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{CacheError, CacheKind, CachedItem};

/// Persisted cache for one route and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCacheFile {
    pub route_id: String,
    pub kind: CacheKind,
    /// Whether every chunk was fetched successfully. Incomplete files are not reused.
    pub complete: bool,
    pub chunk_count: usize,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<CachedItem>,
}

/// Directory of route cache files for one kind.
#[derive(Debug, Clone)]
pub struct RouteCacheStore {
    directory: PathBuf,
    kind: CacheKind,
}

impl RouteCacheStore {
    /// Store under `<root>/<kind>/`.
    pub fn new(root: impl AsRef<Path>, kind: CacheKind) -> Self {
        Self {
            directory: root.as_ref().join(kind.dir_name()),
            kind,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path for a route id. Characters outside `[A-Za-z0-9_-]` are
    /// replaced so ids cannot escape the directory.
    pub fn path_for(&self, route_id: &str) -> PathBuf {
        let name: String = route_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{}.json", name))
    }

    /// Load a cache file; `Ok(None)` when it does not exist.
    pub async fn load(&self, route_id: &str) -> Result<Option<RouteCacheFile>, CacheError> {
        let path = self.path_for(route_id);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                let file: RouteCacheFile = serde_json::from_slice(&data)?;
                if file.kind != self.kind || file.route_id != route_id {
                    debug!(path = %path.display(), "Ignoring cache file for another route");
                    return Ok(None);
                }
                Ok(Some(file))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Whether a complete cache exists.
    pub async fn has_complete(&self, route_id: &str) -> bool {
        matches!(self.load(route_id).await, Ok(Some(file)) if file.complete)
    }

    /// Write a cache file atomically via a temp file.
    pub async fn save(&self, file: &RouteCacheFile) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path_for(&file.route_id);
        let temp_path = path.with_extension("tmp");
        let data = serde_json::to_vec(file)?;
        tokio::fs::write(&temp_path, &data).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    pub async fn remove(&self, route_id: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.path_for(route_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    pub async fn remove_all(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.directory).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheValue;
    use crate::geo::Coordinate;
    use tempfile::TempDir;

    fn file(route_id: &str, complete: bool) -> RouteCacheFile {
        RouteCacheFile {
            route_id: route_id.to_string(),
            kind: CacheKind::SpeedLimit,
            complete,
            chunk_count: 1,
            updated_at: Utc::now(),
            items: vec![CachedItem::new(
                Coordinate::new(48.0, 11.0),
                CacheValue::SpeedLimit { kmh: 30 },
            )],
        }
    }

    #[test]
    fn test_path_sanitises_route_id() {
        let store = RouteCacheStore::new("/cache", CacheKind::Poi);
        let path = store.path_for("../etc/passwd");
        assert_eq!(path, PathBuf::from("/cache/poi/___etc_passwd.json"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = RouteCacheStore::new(dir.path(), CacheKind::SpeedLimit);

        assert!(store.load("r1").await.unwrap().is_none());
        store.save(&file("r1", true)).await.unwrap();

        let loaded = store.load("r1").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert!(store.has_complete("r1").await);
        assert!(!store.path_for("r1").with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_incomplete_file_is_not_complete() {
        let dir = TempDir::new().unwrap();
        let store = RouteCacheStore::new(dir.path(), CacheKind::SpeedLimit);
        store.save(&file("r1", false)).await.unwrap();
        assert!(!store.has_complete("r1").await);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = RouteCacheStore::new(dir.path(), CacheKind::SpeedLimit);
        store.remove("nope").await.unwrap();
        store.remove_all().await.unwrap();
    }
}
