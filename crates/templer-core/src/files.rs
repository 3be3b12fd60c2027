//! Cached source files and the path-keyed file registry
//!
//! Every file templer reads (definitions, variable files, templates) goes
//! through a [`FileRegistry`]. The registry holds at most one [`SourceFile`]
//! per absolute path, so every consumer of a path observes the same cached
//! content and the same [`ChangeSignal`]. Entries live as long as they have
//! listeners.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::signal::ChangeSignal;

/// Backend that delivers filesystem change notifications for registered paths
pub trait PathWatcher {
    /// Start watching `path` for creation and modification
    fn watch(&mut self, path: &Path) -> std::io::Result<()>;

    /// Stop watching `path`
    fn unwatch(&mut self, path: &Path);
}

#[derive(Debug, Clone)]
struct CachedContent {
    content: String,
    hash: String,
}

/// A file on disk with cached content and a change signal
#[derive(Debug)]
pub struct SourceFile<L> {
    path: PathBuf,
    cache: Option<CachedContent>,
    signal: ChangeSignal<L>,
    watched: bool,
    loads: usize,
}

impl<L: Clone + PartialEq> SourceFile<L> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
            signal: ChangeSignal::new(),
            watched: false,
            loads: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_watched(&self) -> bool {
        self.watched
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// SHA-256 of the cached content
    pub fn content_hash(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.hash.as_str())
    }

    /// Number of times the content was loaded from disk
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn signal(&self) -> &ChangeSignal<L> {
        &self.signal
    }

    pub fn signal_mut(&mut self) -> &mut ChangeSignal<L> {
        &mut self.signal
    }

    /// Read the file, serving the cached content when present
    pub fn read(&mut self) -> Result<&str> {
        if self.cache.is_some() {
            tracing::debug!("Return cached file '{}'", self.path.display());
        } else {
            let content = load(&self.path)?;
            self.loads += 1;
            let hash = hex::encode(Sha256::digest(content.as_bytes()));
            self.cache = Some(CachedContent { content, hash });
        }

        Ok(self
            .cache
            .as_ref()
            .map(|c| c.content.as_str())
            .unwrap_or_default())
    }

    /// Write `content` to `path`
    ///
    /// Fails if the destination exists and `force_overwrite` is not set, or if
    /// the destination exists and is not a regular file. Missing parent
    /// directories are created.
    pub fn write(content: &str, path: &Path, force_overwrite: bool) -> Result<()> {
        if path.exists() {
            if !path.is_file() {
                return Err(CoreError::NotAFile {
                    path: path.to_path_buf(),
                });
            }
            if !force_overwrite {
                return Err(CoreError::AlreadyExists {
                    path: path.to_path_buf(),
                });
            }
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }

        tracing::debug!("Writing file '{}'", path.display());
        fs::write(path, content).map_err(|e| CoreError::io(path, e))
    }
}

fn load(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CoreError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CoreError::io(path, e),
    })?;

    if !metadata.is_file() {
        return Err(CoreError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!("Loading file '{}'", path.display());
    fs::read_to_string(path).map_err(|e| CoreError::io(path, e))
}

/// Make `path` absolute and remove `.` and `..` components lexically
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Registry of source files keyed by absolute path
pub struct FileRegistry<L> {
    files: IndexMap<PathBuf, SourceFile<L>>,
    watcher: Option<Box<dyn PathWatcher>>,
}

impl<L: Clone + PartialEq> Default for FileRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Clone + PartialEq> FileRegistry<L> {
    /// Registry without change notifications
    pub fn new() -> Self {
        Self {
            files: IndexMap::new(),
            watcher: None,
        }
    }

    /// Registry that registers watched files with `watcher`
    pub fn with_watcher(watcher: Box<dyn PathWatcher>) -> Self {
        Self {
            files: IndexMap::new(),
            watcher: Some(watcher),
        }
    }

    /// Get the file for `path`, creating it on first reference
    ///
    /// With `watch` set, the file is registered with the watcher once.
    pub fn get_or_insert(&mut self, path: &Path, watch: bool) -> &mut SourceFile<L> {
        let key = normalize_path(path);
        let watcher = &mut self.watcher;
        let file = self
            .files
            .entry(key.clone())
            .or_insert_with(|| SourceFile::new(key));

        if watch && !file.watched {
            if let Some(watcher) = watcher.as_mut() {
                match watcher.watch(&file.path) {
                    Ok(()) => file.watched = true,
                    Err(e) => tracing::warn!(
                        "Could not watch '{}' for changes: {}",
                        file.path.display(),
                        e
                    ),
                }
            }
        }

        file
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile<L>> {
        self.files.get(&normalize_path(path))
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut SourceFile<L>> {
        self.files.get_mut(&normalize_path(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    /// Whether `path` is registered and watched
    pub fn is_watched(&self, path: &Path) -> bool {
        self.get(path).is_some_and(SourceFile::is_watched)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }


    /// Read `path` through the cache
    pub fn read(&mut self, path: &Path) -> Result<&str> {
        self.get_or_insert(path, false).read()
    }

    /// Re-read a registered file after a filesystem event
    ///
    /// Returns `true` when the content hash differs from the previous one.
    /// Unregistered paths are ignored.
    pub fn refresh(&mut self, path: &Path) -> Result<bool> {
        let Some(file) = self.get_mut(path) else {
            return Ok(false);
        };

        let old_hash = file.cache.take().map(|c| c.hash);
        file.read()?;
        let changed = old_hash.as_deref() != file.content_hash();
        if changed {
            tracing::debug!("File '{}' changed", file.path.display());
        }
        Ok(changed)
    }

    /// Register `listener` on the signal of `path`
    pub fn subscribe(&mut self, path: &Path, watch: bool, listener: L) {
        self.get_or_insert(path, watch).signal.subscribe(listener);
    }

    /// Remove one registration of `listener` from `path`
    ///
    /// The file is dropped from the registry (and unwatched) once its last
    /// listener is gone.
    pub fn unsubscribe(&mut self, path: &Path, listener: &L) {
        let key = normalize_path(path);
        let Some(file) = self.files.get_mut(&key) else {
            return;
        };

        file.signal.unsubscribe(listener);
        if file.signal.is_empty() {
            self.remove(&key);
        }
    }

    /// Listeners of `path` in subscription order
    pub fn listeners(&self, path: &Path) -> Vec<L> {
        self.get(path)
            .map(|file| file.signal.fire())
            .unwrap_or_default()
    }

    /// Drop every file without listeners
    pub fn release_unused(&mut self) {
        let unused: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(_, file)| file.signal.is_empty())
            .map(|(path, _)| path.clone())
            .collect();

        for path in unused {
            self.remove(&path);
        }
    }

    /// Release every watch registration, keeping cached content
    pub fn release_watches(&mut self) {
        for file in self.files.values_mut() {
            if file.watched {
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.unwatch(&file.path);
                }
                file.watched = false;
            }
        }
    }

    fn remove(&mut self, key: &Path) {
        if let Some(file) = self.files.shift_remove(key) {
            tracing::debug!("Releasing file '{}'", file.path.display());
            if file.watched {
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.unwatch(&file.path);
                }
            }
        }
    }
}
