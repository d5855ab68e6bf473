use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use kustoship_common::{debug, warn};

use crate::{
    error::{DeployError, DeployResult, DeployStage},
    k8s::{OverlayDocument, PatchDocument},
    storage::Storage,
};

/// `kustomize build` discovers its input by this name in the current directory, so the writer and
/// the overlay builder both depend on it.
pub const OVERLAY_FILE: &str = "kustomization.yaml";
/// Referenced from the overlay's `patchesStrategicMerge`.
pub const PATCH_FILE: &str = ".patch-deployment.yaml";

pub struct ManifestWriter {
    storage: Arc<dyn Storage>,
    working_dir: PathBuf,
}

impl ManifestWriter {
    pub fn new<P: Into<PathBuf>>(storage: Arc<dyn Storage>, working_dir: P) -> Self {
        Self {
            storage,
            working_dir: working_dir.into(),
        }
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.working_dir.join(OVERLAY_FILE)
    }

    pub fn patch_path(&self) -> PathBuf {
        self.working_dir.join(PATCH_FILE)
    }

    /// Encode and write both documents. Whatever was created is removed again when the returned
    /// guard drops, including when this call itself fails halfway.
    pub fn write(
        &self,
        overlay: &OverlayDocument,
        patch: &PatchDocument,
    ) -> DeployResult<WrittenManifests> {
        let overlay_yaml = overlay.to_yaml()?;
        let patch_yaml = patch.to_yaml()?;

        let mut written = WrittenManifests {
            storage: Arc::clone(&self.storage),
            paths: Vec::with_capacity(2),
        };
        for (path, contents) in [
            (self.overlay_path(), overlay_yaml),
            (self.patch_path(), patch_yaml),
        ] {
            debug!("Writing {}", path.display());
            if let Err(e) = self.storage.create(&path, contents.as_bytes()) {
                // On a collision the file belongs to someone else.
                if e.kind() != io::ErrorKind::AlreadyExists {
                    self.storage.remove(&path).ok();
                }
                return Err(DeployError::io(DeployStage::Write, &path, e));
            }
            written.paths.push(path);
        }
        Ok(written)
    }
}

/// Transient pipeline inputs on disk. Removed on drop; removal failures are logged, never raised.
#[must_use = "dropping the guard removes the files immediately"]
pub struct WrittenManifests {
    storage: Arc<dyn Storage>,
    paths: Vec<PathBuf>,
}

impl std::fmt::Debug for WrittenManifests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrittenManifests")
            .field("paths", &self.paths)
            .finish()
    }
}

impl WrittenManifests {
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Remove the files now rather than at end of scope.
    pub fn cleanup(self) {}
}

impl Drop for WrittenManifests {
    fn drop(&mut self) {
        for path in self.paths.drain(..).rev() {
            match self.storage.remove(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Unable to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        config::DeploymentConfig,
        identity::DeploymentIdentity,
        k8s::{OverlayDocumentBuilder, PatchDocumentBuilder},
        storage::{LocalStorage, MemoryStorage},
    };

    fn documents() -> (OverlayDocument, PatchDocument) {
        let identity = DeploymentIdentity {
            id: "01HX3K9QY8V4T2".to_string(),
            name: "web-01hx3k9qy8v4t2".to_string(),
        };
        let overlay = OverlayDocumentBuilder::new("base")
            .build(&DeploymentConfig::new(), &identity)
            .unwrap();
        let patch = PatchDocumentBuilder
            .build("example-app:1.0.0", &identity, &BTreeMap::new())
            .unwrap();
        (overlay, patch)
    }

    #[test]
    fn test_files_exist_until_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ManifestWriter::new(Arc::new(LocalStorage), dir.path());
        let (overlay, patch) = documents();

        let written = writer.write(&overlay, &patch).unwrap();
        let on_disk = std::fs::read_to_string(dir.path().join(OVERLAY_FILE)).unwrap();
        assert_eq!(on_disk, overlay.to_yaml().unwrap());
        assert!(dir.path().join(PATCH_FILE).is_file());
        assert!(written.contains(&dir.path().join(PATCH_FILE)));

        written.cleanup();
        assert!(!dir.path().join(OVERLAY_FILE).exists());
        assert!(!dir.path().join(PATCH_FILE).exists());
    }

    #[test]
    fn test_partial_write_is_cleaned_up() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_on("/work/.patch-deployment.yaml");
        let writer = ManifestWriter::new(storage.clone(), "/work");
        let (overlay, patch) = documents();

        let err = writer.write(&overlay, &patch).unwrap_err();
        assert_eq!(err.stage(), DeployStage::Write);
        assert_eq!(storage.history(), vec![PathBuf::from("/work/kustomization.yaml")]);
        assert!(storage.files().is_empty());
    }

    #[test]
    fn test_failure_after_create_removes_the_file() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_after_create("/work/.patch-deployment.yaml");
        let writer = ManifestWriter::new(storage.clone(), "/work");
        let (overlay, patch) = documents();

        let err = writer.write(&overlay, &patch).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Io { ref path, .. } if path == Path::new("/work/.patch-deployment.yaml")
        ));
        assert_eq!(storage.history().len(), 2);
        assert!(storage.files().is_empty());
    }

    #[test]
    fn test_existing_kustomization_is_a_collision() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("/work/kustomization.yaml", b"user owned");
        let writer = ManifestWriter::new(storage.clone(), "/work");
        let (overlay, patch) = documents();

        let err = writer.write(&overlay, &patch).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Io { ref path, .. } if path == Path::new("/work/kustomization.yaml")
        ));
        assert_eq!(
            storage.read(Path::new("/work/kustomization.yaml")),
            Some(b"user owned".to_vec())
        );
    }
}
