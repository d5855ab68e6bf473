//! Filesystem capability used by the pipeline.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

pub trait Storage: Send + Sync {
    /// Create `path` with `contents`, failing if it already exists.
    fn create(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace `path` wholesale: readers observe either the old or the new contents.
    fn replace(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn create(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let written = file.write_all(contents).and_then(|()| file.sync_all());
        if written.is_err() {
            drop(file);
            std::fs::remove_file(path).ok();
        }
        written
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn replace(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // The temp file lives next to the target so the rename stays on one filesystem.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// In-memory storage for driving the pipeline without touching disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    /// Every path ever created or replaced, in order.
    history: Vec<PathBuf>,
    fail_on: BTreeSet<PathBuf>,
    /// Created, then reported as failed, like a disk filling up mid-write.
    fail_after_create: BTreeSet<PathBuf>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-write; the maps are still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every later write to `path` fail with `PermissionDenied`.
    pub fn fail_on<P: Into<PathBuf>>(&self, path: P) {
        self.lock().fail_on.insert(path.into());
    }

    /// Make later creates of `path` leave the file behind and still report an error.
    pub fn fail_after_create<P: Into<PathBuf>>(&self, path: P) {
        self.lock().fail_after_create.insert(path.into());
    }

    pub fn insert<P: Into<PathBuf>>(&self, path: P, contents: &[u8]) {
        self.lock().files.insert(path.into(), contents.to_vec());
    }

    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(path)
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn history(&self) -> Vec<PathBuf> {
        self.lock().history.clone()
    }
}

impl Storage for MemoryStorage {
    fn create(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_on.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "write denied"));
        }
        if state.files.contains_key(path) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "file exists"));
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
        state.history.push(path.to_path_buf());
        if state.fail_after_create.contains(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_on.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mkdir denied"));
        }
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn replace(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_on.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "write denied"));
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
        state.history.push(path.to_path_buf());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match self.lock().files.remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }
}
