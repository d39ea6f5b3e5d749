use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::net::ResourceResponse;

/// Suffix for a generation directory that is being populated by an install
/// and is not yet servable.
const STAGING_SUFFIX: &str = ".staging";

/// Suffix for the previous contents of a generation while a commit swaps in
/// the staged replacement.
const RETIRED_SUFFIX: &str = ".retired";

/// Metadata stored beside each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
}

/// Root directory holding all cache generations.
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open (creating if absent) the named generation.
    pub fn generation(&self, name: &str) -> Result<Generation, CacheError> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Generation {
            name: name.to_string(),
            dir,
        })
    }

    /// Open a fresh staging area for the named generation, discarding any
    /// leftover from an earlier aborted install.
    pub fn staging(&self, name: &str) -> Result<Generation, CacheError> {
        let dir = self.root.join(format!("{name}{STAGING_SUFFIX}"));
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(Generation {
            name: name.to_string(),
            dir,
        })
    }

    /// Promote a fully populated staging area to the servable generation.
    /// Any previous contents are renamed aside before the swap and deleted
    /// after it, so a crash mid-commit always leaves one copy on disk.
    pub fn commit_staging(&self, name: &str) -> Result<(), CacheError> {
        let staged = self.root.join(format!("{name}{STAGING_SUFFIX}"));
        let target = self.root.join(name);
        let retired = self.root.join(format!("{name}{RETIRED_SUFFIX}"));

        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        let had_previous = target.exists();
        if had_previous {
            fs::rename(&target, &retired)?;
        }
        fs::rename(&staged, &target)?;
        if had_previous {
            fs::remove_dir_all(&retired)?;
        }
        Ok(())
    }

    /// Drop an in-progress staging area after a failed install.
    pub fn discard_staging(&self, name: &str) -> Result<(), CacheError> {
        let staged = self.root.join(format!("{name}{STAGING_SUFFIX}"));
        if staged.exists() {
            fs::remove_dir_all(&staged)?;
        }
        Ok(())
    }

    /// Names of all generations currently on disk, staging areas included.
    pub fn generations(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every generation whose name differs from `keep`, returning how
    /// many were removed. This is the activation garbage-collection step.
    pub fn retain_only(&self, keep: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        for name in self.generations()? {
            if name != keep {
                info!(generation = %name, "removing stale generation");
                fs::remove_dir_all(self.root.join(&name))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }
}

/// A single named generation: a directory of cached responses keyed by
/// request identity (method + URL).
#[derive(Debug, Clone)]
pub struct Generation {
    name: String,
    dir: PathBuf,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable entry key: hex SHA-256 over "<METHOD> <url>".
    fn key(method: &str, url: &str) -> String {
        let digest = Sha256::digest(format!("{method} {url}").as_bytes());
        let mut key = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(key, "{byte:02x}");
        }
        key
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    /// Look up the stored response for a request, if any.
    pub fn lookup(&self, method: &str, url: &str) -> Result<Option<ResourceResponse>, CacheError> {
        let key = Self::key(method, url);
        let meta_path = self.meta_path(&key);
        if !meta_path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&meta_path)?;
        let meta: EntryMeta = serde_json::from_str(&raw)
            .map_err(|e| CacheError::BadEntry(format!("{url}: {e}")))?;
        let body = fs::read(self.body_path(&key))?;

        debug!(generation = %self.name, url, "cache hit");
        Ok(Some(ResourceResponse {
            status: meta.status,
            headers: meta.headers,
            body,
        }))
    }

    /// Store a response under the request identity, overwriting any previous
    /// entry (last write wins). The body lands first and the metadata is
    /// committed by rename, so a reader never sees an entry whose body is
    /// missing or truncated.
    pub fn store(
        &self,
        method: &str,
        url: &str,
        response: &ResourceResponse,
    ) -> Result<(), CacheError> {
        let key = Self::key(method, url);

        let body_staging = self.dir.join(format!("{key}.bin.tmp"));
        fs::write(&body_staging, &response.body)?;
        fs::rename(&body_staging, self.body_path(&key))?;

        let meta = EntryMeta {
            method: method.to_string(),
            url: url.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        let meta_staging = self.dir.join(format!("{key}.json.tmp"));
        let contents = serde_json::to_string(&meta)
            .map_err(|e| CacheError::BadEntry(format!("{url}: {e}")))?;
        fs::write(&meta_staging, contents)?;
        fs::rename(&meta_staging, self.meta_path(&key))?;

        debug!(generation = %self.name, url, bytes = response.body.len(), "entry stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_lookup_returns_same_body() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();
        let generation = storage.generation("v1").unwrap();

        let response = ResourceResponse::ok(b"tile bytes".to_vec());
        generation
            .store("GET", "https://tiles.test/1/2/3.png", &response)
            .unwrap();

        let hit = generation
            .lookup("GET", "https://tiles.test/1/2/3.png")
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, b"tile bytes");
        assert_eq!(hit.status, 200);
    }

    #[test]
    fn test_lookup_misses_on_unknown_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();
        let generation = storage.generation("v1").unwrap();

        assert!(generation
            .lookup("GET", "https://tiles.test/missing.png")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_retain_only_deletes_other_generations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();
        storage.generation("v1").unwrap();
        storage.generation("v2").unwrap();

        let removed = storage.retain_only("v2").unwrap();

        assert_eq!(removed, 1);
        assert!(!storage.exists("v1"));
        assert!(storage.exists("v2"));
        assert_eq!(storage.generations().unwrap(), vec!["v2".to_string()]);
    }

    #[test]
    fn test_staging_commit_replaces_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        let old = storage.generation("v1").unwrap();
        old.store("GET", "https://app.test/", &ResourceResponse::ok(b"old".to_vec()))
            .unwrap();

        let staged = storage.staging("v1").unwrap();
        staged
            .store("GET", "https://app.test/", &ResourceResponse::ok(b"new".to_vec()))
            .unwrap();
        storage.commit_staging("v1").unwrap();

        let generation = storage.generation("v1").unwrap();
        let hit = generation.lookup("GET", "https://app.test/").unwrap().unwrap();
        assert_eq!(hit.body, b"new");
        assert_eq!(storage.generations().unwrap(), vec!["v1".to_string()]);
    }

    #[test]
    fn test_discard_staging_leaves_generation_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        let generation = storage.generation("v1").unwrap();
        generation
            .store("GET", "https://app.test/", &ResourceResponse::ok(b"keep".to_vec()))
            .unwrap();

        storage.staging("v1").unwrap();
        storage.discard_staging("v1").unwrap();

        assert!(storage.exists("v1"));
        assert_eq!(storage.generations().unwrap(), vec!["v1".to_string()]);
    }
}
