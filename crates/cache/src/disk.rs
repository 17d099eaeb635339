use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncReadExt;

use crate::error::CacheError;
use crate::key::CacheKey;

const BODY_EXTENSION: &str = "body";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A stored body together with how long ago it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: String,
    pub age: Duration,
}

impl CacheEntry {
    pub fn is_fresher_than(&self, threshold: Duration) -> bool {
        self.age < threshold
    }
}

/// File-per-key cache rooted at a directory.
///
/// Writes go to a uniquely named temporary file which is then renamed over
/// the entry, so a reader observes either the previous body or the new one.
/// Nothing is ever deleted; old entries stay on disk as a stale fallback.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.file_stem(), BODY_EXTENSION))
    }

    /// Look up the entry for `key`, whatever its age.
    ///
    /// Storage errors are logged and reported as a miss.
    pub async fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.try_read(key).await {
            Ok(Some(entry)) => {
                tracing::debug!("Cache hit for {} (age {:?})", key, entry.age);
                Some(entry)
            }
            Ok(None) => {
                tracing::debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Cache unavailable for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Same lookup as [`read`](Self::read), used when any age is acceptable.
    pub async fn read_stale_allowed(&self, key: &CacheKey) -> Option<String> {
        self.read(key).await.map(|entry| entry.body)
    }

    /// Persist `body` under `key`, replacing any previous entry.
    ///
    /// A failed write leaves the previous entry readable.
    pub async fn write(&self, key: &CacheKey, body: &str) -> crate::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp_path = self.temp_path_for(key);

        if let Err(e) = tokio::fs::write(&tmp_path, body).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CacheError::io(tmp_path, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CacheError::io(path, e));
        }

        tracing::debug!("Cached {} bytes for {}", body.len(), key);
        Ok(())
    }

    async fn try_read(&self, key: &CacheKey) -> crate::Result<Option<CacheEntry>> {
        let path = self.path_for(key);

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        // Metadata and body come from the same handle, so a concurrent
        // rename cannot pair one entry's body with another's timestamp.
        let modified = file
            .metadata()
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| CacheError::io(&path, e))?;

        let mut body = String::new();
        file.read_to_string(&mut body)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        Ok(Some(CacheEntry { body, age }))
    }

    fn temp_path_for(&self, key: &CacheKey) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{}.{}.tmp",
            key.file_stem(),
            BODY_EXTENSION,
            std::process::id(),
            n
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn set_age(path: &Path, age: Duration) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn entries_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_write_then_read_returns_body_with_near_zero_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("craigslist").param("sort", "date");

        cache.write(&key, "<rss>body</rss>").await.unwrap();
        let entry = cache.read(&key).await.unwrap();

        assert_eq!(entry.body, "<rss>body</rss>");
        assert!(entry.age < Duration::from_secs(5));
        assert!(entry.is_fresher_than(Duration::from_secs(3 * 60 * 60)));
    }

    #[tokio::test]
    async fn test_read_missing_key_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        assert!(cache.read(&CacheKey::new("nothing")).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("does/not/exist"));

        assert!(cache.read(&CacheKey::new("reddit")).await.is_none());
        assert!(cache
            .read_stale_allowed(&CacheKey::new("reddit"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("nested/cache"));
        let key = CacheKey::new("reddit");

        cache.write(&key, "data").await.unwrap();

        assert_eq!(cache.read_stale_allowed(&key).await.as_deref(), Some("data"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_previous_body() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("reddit").param("subreddit", "annarbor");

        cache.write(&key, "first").await.unwrap();
        cache.write(&key, "second").await.unwrap();

        assert_eq!(cache.read(&key).await.unwrap().body, "second");
        assert_eq!(entries_in(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let hot = CacheKey::new("reddit").param("sort", "hot");
        let new = CacheKey::new("reddit").param("sort", "new");

        cache.write(&hot, "hot posts").await.unwrap();

        assert!(cache.read(&new).await.is_none());

        cache.write(&new, "new posts").await.unwrap();
        assert_eq!(cache.read(&hot).await.unwrap().body, "hot posts");
        assert_eq!(cache.read(&new).await.unwrap().body, "new posts");
    }

    #[tokio::test]
    async fn test_same_query_in_any_order_shares_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let written = CacheKey::new("reddit")
            .param("subreddit", "annarbor")
            .param("sort", "top");
        let looked_up = CacheKey::new("reddit")
            .param("sort", "top")
            .param("subreddit", "annarbor");

        cache.write(&written, "shared").await.unwrap();

        assert_eq!(cache.read(&looked_up).await.unwrap().body, "shared");
    }

    #[tokio::test]
    async fn test_old_entry_reports_its_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("craigslist");

        cache.write(&key, "old").await.unwrap();
        set_age(&cache.path_for(&key), Duration::from_secs(4 * 60 * 60));

        let entry = cache.read(&key).await.unwrap();
        assert!(entry.age >= Duration::from_secs(4 * 60 * 60 - 5));
        assert!(!entry.is_fresher_than(Duration::from_secs(3 * 60 * 60)));
        assert_eq!(cache.read_stale_allowed(&key).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::new("craigslist");
        cache.write(&key, "good").await.unwrap();

        // A directory squatting on the target path makes the rename fail.
        let blocked = CacheKey::new("blocked");
        std::fs::create_dir(cache.path_for(&blocked)).unwrap();
        std::fs::write(cache.path_for(&blocked).join("keep"), "x").unwrap();

        assert!(cache.write(&blocked, "new").await.is_err());
        assert_eq!(cache.read(&key).await.unwrap().body, "good");
        assert!(entries_in(dir.path()).iter().all(|n| !n.ends_with(".tmp")));
    }

    #[tokio::test]
    async fn test_write_into_unusable_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not-a-dir");
        std::fs::write(&file_path, "x").unwrap();
        let cache = DiskCache::new(&file_path);

        let err = cache.write(&CacheKey::new("reddit"), "data").await;
        assert!(err.is_err());
        assert!(cache.read(&CacheKey::new("reddit")).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_never_corrupt_readers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path()));
        let key = CacheKey::new("reddit").param("subreddit", "annarbor");

        let bodies: Vec<String> = (0..8)
            .map(|i| format!("{}", i).repeat(64 * 1024))
            .collect();
        cache.write(&key, &bodies[0]).await.unwrap();

        let mut handles = Vec::new();
        for body in bodies.clone() {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    cache.write(&key, &body).await.unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let bodies = bodies.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let entry = cache.read(&key).await.unwrap();
                    assert!(bodies.contains(&entry.body));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_body = cache.read(&key).await.unwrap().body;
        assert!(bodies.contains(&final_body));
        assert_eq!(entries_in(dir.path()), vec![cache
            .path_for(&key)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()]);
    }
}
