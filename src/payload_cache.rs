use crate::models::{extension_for, MediaItem};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// A live, revocable reference to an item's payload: a file materialized in
/// the app cache directory, loadable by the webview through the asset
/// protocol. The desktop analog of an object URL.
#[derive(Debug, Clone)]
pub struct PayloadHandle {
    pub id: String,
    pub path: PathBuf,
    pub mime: String,
}

/// Maps item ids to their live handles. Owned by the top-level app state and
/// passed to whoever displays media; never a module-level global. At most one
/// live handle exists per id, and every handle must eventually be released —
/// on item delete, on viewer close, and wholesale before a full reload —
/// otherwise materialized files pile up for the life of the process.
pub struct PayloadCache {
    dir: PathBuf,
    live: HashMap<String, PayloadHandle>,
}

impl PayloadCache {
    /// Starts with an empty directory. Files materialized by a previous
    /// session are unreachable once the live map is gone, so anything left
    /// over in `dir` is purged here rather than leaking until reinstall.
    pub fn new(dir: PathBuf) -> Result<Self> {
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("purge stale payload cache dir {}", dir.display()))?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("create payload cache dir {}", dir.display()))?;
        Ok(Self {
            dir,
            live: HashMap::new(),
        })
    }

    /// Returns the existing handle when one is live for this id; otherwise
    /// materializes the payload and records the new handle.
    pub fn handle_for(&mut self, item: &MediaItem) -> Result<PayloadHandle> {
        if let Some(handle) = self.live.get(&item.id) {
            return Ok(handle.clone());
        }

        let file = self
            .dir
            .join(format!("{}{}", item.id, extension_for(&item.mime)));
        fs::write(&file, &item.payload)
            .with_context(|| format!("materialize payload to {}", file.display()))?;

        let handle = PayloadHandle {
            id: item.id.clone(),
            path: file,
            mime: item.mime.clone(),
        };
        self.live.insert(item.id.clone(), handle.clone());
        Ok(handle)
    }

    /// Invalidates the handle for `id` and removes its backing file.
    /// No-op when none is live.
    pub fn release(&mut self, id: &str) {
        if let Some(handle) = self.live.remove(id) {
            let _ = fs::remove_file(&handle.path);
        }
    }

    /// Frees every live handle. Called before a full reload and on clear-all.
    pub fn release_all(&mut self) {
        for (_, handle) in self.live.drain() {
            let _ = fs::remove_file(&handle.path);
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaItem;
    use tempfile::TempDir;

    fn cache() -> (TempDir, PayloadCache) {
        let dir = TempDir::new().unwrap();
        let cache = PayloadCache::new(dir.path().join("media")).unwrap();
        (dir, cache)
    }

    fn item(payload: Vec<u8>) -> MediaItem {
        MediaItem::new("cat.png".into(), "Pets", vec![], "image/png".into(), payload)
    }

    #[test]
    fn repeated_handle_for_returns_the_same_handle() {
        let (_dir, mut cache) = cache();
        let it = item(vec![1, 2, 3]);

        let first = cache.handle_for(&it).unwrap();
        let second = cache.handle_for(&it).unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(cache.live_count(), 1);
        assert_eq!(fs::read(&first.path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn release_removes_the_backing_file() {
        let (_dir, mut cache) = cache();
        let it = item(vec![9]);
        let handle = cache.handle_for(&it).unwrap();
        assert!(handle.path.exists());

        cache.release(&it.id);
        assert!(!handle.path.exists());
        assert_eq!(cache.live_count(), 0);

        // A second release is a no-op, and a fresh handle re-materializes.
        cache.release(&it.id);
        let again = cache.handle_for(&it).unwrap();
        assert!(again.path.exists());
    }

    #[test]
    fn release_all_drains_every_handle() {
        let (_dir, mut cache) = cache();
        let a = item(vec![1]);
        let b = item(vec![2]);
        let ha = cache.handle_for(&a).unwrap();
        let hb = cache.handle_for(&b).unwrap();

        cache.release_all();
        assert_eq!(cache.live_count(), 0);
        assert!(!ha.path.exists());
        assert!(!hb.path.exists());
    }

    #[test]
    fn leftover_files_from_a_previous_session_are_purged() {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(&media).unwrap();
        let stale = media.join("old-id.png");
        fs::write(&stale, vec![1, 2, 3]).unwrap();

        // As on relaunch: a fresh cache over the same directory.
        let mut cache = PayloadCache::new(media).unwrap();
        assert!(!stale.exists());
        assert_eq!(cache.live_count(), 0);

        // The purged directory is immediately usable again.
        let handle = cache.handle_for(&item(vec![7])).unwrap();
        assert!(handle.path.exists());
    }

    #[test]
    fn handle_extension_follows_mime() {
        let (_dir, mut cache) = cache();
        let mut it = item(vec![0]);
        it.mime = "video/mp4".into();
        let handle = cache.handle_for(&it).unwrap();
        assert!(handle.path.to_string_lossy().ends_with(".mp4"));
        assert_eq!(handle.mime, "video/mp4");
    }
}
