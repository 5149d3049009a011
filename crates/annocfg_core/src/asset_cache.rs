//! File-backed asset cache with modification-time invalidation
//!
//! Prop files and subfile documents are read many times during one import
//! (every prop instance of a container points at the same few `.prp` files).
//! The [`AssetCache`] keeps one parsed copy per path and type-erases it
//! behind `Arc<dyn Any + Send + Sync>`.
//!
//! Each entry remembers the file's modification time when it was read. A
//! later [`load`](AssetCache::load) of the same path re-reads the file if the
//! time on disk differs, so edits made outside the tool are picked up.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = AssetCache::new();
//! let data: Arc<PropData> = cache.fetch::<PropData>("data/props/crate.prp")?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::document::Document;
use crate::error::AssetError;
use crate::registry::DocumentFormat;

/// Sequential id of a cache entry, starting at 1
pub type AssetId = u64;

/// Id and path of one cached file
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct AssetHandle {
    id: AssetId,
    path: PathBuf,
}

impl AssetHandle {
    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parsed file contents the [`AssetCache`] can hold
pub trait Asset: Sized + Send + Sync + 'static {
    /// # Errors
    /// [`AssetError::Io`] when unreadable, [`AssetError::Format`] when malformed.
    fn load_from_file(path: &Path) -> Result<Self, AssetError>;
}

impl Asset for Document {
    /// `.cf7` files are read as fragments, everything else needs one root
    fn load_from_file(path: &Path) -> Result<Self, AssetError> {
        let bytes = fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fragment = DocumentFormat::from_path(path)
            .map(DocumentFormat::is_fragment)
            .unwrap_or(false);
        Document::parse_bytes(&bytes, fragment).map_err(|source| AssetError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}

struct CachedEntry {
    data: Arc<dyn Any + Send + Sync>,
    path: PathBuf,
    /// Modification time of the file when it was read
    modified: Option<SystemTime>,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// A type-erased asset cache keyed by file path
pub struct AssetCache {
    assets: HashMap<AssetId, CachedEntry>,
    /// Reverse index from file path to asset ID
    path_index: HashMap<PathBuf, AssetId>,
    next_id: u64,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            path_index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Load an asset, reusing the cached copy while the file is unchanged
    ///
    /// # Errors
    ///
    /// Returns an [`AssetError`] if the file cannot be loaded. A failed reload
    /// drops the stale entry.
    pub fn load<T: Asset>(&mut self, path: impl AsRef<Path>) -> Result<AssetHandle, AssetError> {
        let path = path.as_ref().to_path_buf();
        let on_disk = modified_time(&path);

        if let Some(id) = self.path_index.get(&path).copied() {
            let fresh = self
                .assets
                .get(&id)
                .map(|entry| entry.modified == on_disk && entry.data.is::<T>())
                .unwrap_or(false);
            if fresh {
                log::debug!("Asset cache hit: {}", path.display());
                return Ok(AssetHandle { id, path });
            }
            match T::load_from_file(&path) {
                Ok(data) => {
                    if let Some(entry) = self.assets.get_mut(&id) {
                        entry.data = Arc::new(data);
                        entry.modified = on_disk;
                    }
                    log::info!("Reloaded changed asset: {}", path.display());
                    return Ok(AssetHandle { id, path });
                }
                Err(err) => {
                    self.invalidate(&path);
                    return Err(err);
                }
            }
        }

        let loaded = T::load_from_file(&path)?;
        let id = self.next_id;
        self.next_id = id + 1;
        self.assets.insert(
            id,
            CachedEntry {
                data: Arc::new(loaded),
                path: path.clone(),
                modified: on_disk,
            },
        );
        self.path_index.insert(path.clone(), id);
        Ok(AssetHandle { id, path })
    }

    /// Cached value behind `handle`, if it holds a `T`
    pub fn get<T: Asset>(&self, handle: &AssetHandle) -> Option<Arc<T>> {
        let entry = self.assets.get(&handle.id)?;
        entry.data.clone().downcast::<T>().ok()
    }

    /// [`load`](Self::load) followed by [`get`](Self::get)
    ///
    /// # Errors
    ///
    /// Returns an [`AssetError`] if the file cannot be loaded.
    pub fn fetch<T: Asset>(&mut self, path: impl AsRef<Path>) -> Result<Arc<T>, AssetError> {
        let path = path.as_ref();
        let handle = self.load::<T>(path)?;
        match self.get::<T>(&handle) {
            Some(data) => Ok(data),
            None => {
                // Same path cached under another type
                self.invalidate(path);
                let handle = self.load::<T>(path)?;
                self.get::<T>(&handle).ok_or_else(|| AssetError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, "asset type mismatch"),
                })
            }
        }
    }

    /// Drop the entry for `path`; returns whether there was one
    pub fn invalidate(&mut self, path: &Path) -> bool {
        match self.path_index.remove(path) {
            Some(id) => self.assets.remove(&id).is_some(),
            None => false,
        }
    }

    /// Drop every entry whose file changed or vanished; returns the dropped paths
    pub fn evict_stale(&mut self) -> Vec<PathBuf> {
        let stale: Vec<PathBuf> = self
            .assets
            .values()
            .filter(|entry| modified_time(&entry.path) != entry.modified)
            .map(|entry| entry.path.clone())
            .collect();
        for path in &stale {
            self.invalidate(path);
        }
        stale
    }

    /// Number of cached files
    pub fn len(&self) -> usize {
        self.path_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_index.is_empty()
    }

    pub fn is_cached(&self, handle: &AssetHandle) -> bool {
        self.assets.contains_key(&handle.id)
    }

    pub fn clear(&mut self) {
        self.assets.clear();
        self.path_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, text: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("annocfg_asset_cache");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_first_handle_is_one() {
        let path = scratch_file("first.cfg", "<Config />");
        let mut cache = AssetCache::new();
        assert!(cache.is_empty());
        let handle = cache.load::<Document>(&path).unwrap();
        assert_eq!((handle.id(), handle.path()), (1, path.as_path()));
        let doc = cache.get::<Document>(&handle).unwrap();
        assert_eq!(doc.root().unwrap().name(), "Config");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_same_path_is_read_once() {
        let path = scratch_file("shared.cfg", "<Config><Models /></Config>");
        let mut cache = AssetCache::new();
        let a = cache.fetch::<Document>(&path).unwrap();
        let b = cache.fetch::<Document>(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file() {
        let mut cache = AssetCache::new();
        let err = cache.load::<Document>("/nonexistent/annocfg/ship.cfg").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_edited_file_is_read_again() {
        let path = scratch_file("edited.cfg", "<Config><A /></Config>");
        let mut cache = AssetCache::new();
        let before = cache.fetch::<Document>(&path).unwrap();

        // Coarse file systems need a visible mtime step
        std::thread::sleep(std::time::Duration::from_millis(1100));
        fs::write(&path, "<Config><B /></Config>").unwrap();

        let after = cache.fetch::<Document>(&path).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.to_xml_string(), "<Config><B /></Config>");
        assert_eq!(cache.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_deleted_file_is_evicted() {
        let path = scratch_file("deleted.cfg", "<Config />");
        let mut cache = AssetCache::new();
        let handle = cache.load::<Document>(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(cache.evict_stale(), vec![path.clone()]);
        assert!(!cache.is_cached(&handle));
    }

    #[test]
    fn test_cf7_is_parsed_as_fragment() {
        let text = "<DummyRoot/>\n<IdCounter>1</IdCounter>\n";
        let path = scratch_file("anim.cf7", text);
        let mut cache = AssetCache::new();
        let doc = cache.fetch::<Document>(&path).unwrap();
        assert!(doc.is_fragment());
        assert_eq!(doc.to_xml_string(), text);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_document() {
        let path = scratch_file("broken.cfg", "<Config><Models></Config>");
        let mut cache = AssetCache::new();
        let err = cache.load::<Document>(&path).unwrap_err();
        assert!(matches!(err, AssetError::Format { .. }));
        let _ = fs::remove_file(&path);
    }
}
