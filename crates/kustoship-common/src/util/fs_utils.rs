use std::path::{Path, PathBuf};

use crate::error::{ShipError, ShipResult};

/// Return the first of `filenames` that exists directly inside `dir`.
pub fn find_file_by_name(dir: &Path, filenames: &[&str]) -> ShipResult<PathBuf> {
    filenames
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ShipError::FileNotFound(filenames.join(", ")))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
