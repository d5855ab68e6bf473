use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use kustoship_common::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{DeployError, DeployResult, DeployStage},
    exec::{CommandRequest, CommandRunner},
    storage::Storage,
};

/// Name of the durable manifest inside the output directory.
pub const OUTPUT_FILE: &str = "output.yaml";

/// Runs `<overlay-tool> build` in the working directory and stores its stdout as the final
/// manifest.
pub struct OverlayBuilder {
    runner: Arc<dyn CommandRunner>,
    storage: Arc<dyn Storage>,
    program: String,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl OverlayBuilder {
    pub fn new<P: Into<String>, D: Into<PathBuf>>(
        runner: Arc<dyn CommandRunner>,
        storage: Arc<dyn Storage>,
        program: P,
        output_dir: D,
    ) -> Self {
        Self {
            runner,
            storage,
            program: program.into(),
            output_dir: output_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILE)
    }

    /// The overlay must already be written to `working_dir`. The previous manifest is only
    /// replaced once the tool has succeeded.
    pub async fn build(
        &self,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> DeployResult<Vec<u8>> {
        self.storage
            .create_dir_all(&self.output_dir)
            .map_err(|e| DeployError::io(DeployStage::Build, &self.output_dir, e))?;

        let request = CommandRequest::new(&self.program, working_dir)
            .arg("build")
            .with_timeout(self.timeout);
        info!("Building overlay with `{}`", request.display());

        let output = self
            .runner
            .run(&request, cancel)
            .await
            .map_err(|e| e.at(DeployStage::Build))?;

        if !output.success() {
            return Err(DeployError::BuildFailed {
                exit_code: output.exit_code,
                stderr: output.stderr_lossy(),
            });
        }
        if !output.stderr.is_empty() {
            debug!("{} build stderr:\n{}", self.program, output.stderr_lossy());
        }

        let manifest = self.manifest_path();
        self.storage
            .replace(&manifest, &output.stdout)
            .map_err(|e| DeployError::io(DeployStage::Build, &manifest, e))?;
        debug!("Wrote {} bytes to {}", output.stdout.len(), manifest.display());

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        exec::{CommandOutput, ExecError},
        storage::MemoryStorage,
    };

    struct Scripted {
        output: CommandOutput,
        seen: Mutex<Vec<CommandRequest>>,
    }

    impl Scripted {
        fn new(exit_code: Option<i32>, stdout: &str, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                output: CommandOutput {
                    exit_code,
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: stderr.as_bytes().to_vec(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(
            &self,
            request: &CommandRequest,
            _cancel: &CancellationToken,
        ) -> Result<CommandOutput, ExecError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_stdout_becomes_manifest() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Scripted::new(Some(0), "kind: Deployment\n", "");
        let builder = OverlayBuilder::new(
            runner.clone(),
            storage.clone(),
            "kustomize",
            "/work/.kustomization",
        );

        let bytes = builder
            .build(Path::new("/work"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes, b"kind: Deployment\n");
        assert!(storage.is_dir(Path::new("/work/.kustomization")));
        assert_eq!(
            storage.read(Path::new("/work/.kustomization/output.yaml")),
            Some(b"kind: Deployment\n".to_vec())
        );

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].display(), "kustomize build");
        assert_eq!(seen[0].cwd, PathBuf::from("/work"));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_manifest() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("/work/.kustomization/output.yaml", b"previous");
        let runner = Scripted::new(Some(1), "partial", "Error: accumulating resources");
        let builder =
            OverlayBuilder::new(runner, storage.clone(), "kustomize", "/work/.kustomization");

        let err = builder
            .build(Path::new("/work"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::BuildFailed {
                exit_code: Some(1),
                ref stderr
            } if stderr == "Error: accumulating resources"
        ));
        assert_eq!(
            storage.read(Path::new("/work/.kustomization/output.yaml")),
            Some(b"previous".to_vec())
        );
    }

    #[tokio::test]
    async fn test_signalled_tool_is_a_build_failure() {
        let storage = Arc::new(MemoryStorage::new());
        let builder = OverlayBuilder::new(
            Scripted::new(None, "", "panic: runtime error"),
            storage.clone(),
            "kustomize",
            "/work/.kustomization",
        );

        let err = builder
            .build(Path::new("/work"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(!err.is_cancelled());
        assert!(matches!(
            err,
            DeployError::BuildFailed {
                exit_code: None,
                ref stderr
            } if stderr == "panic: runtime error"
        ));
        assert!(!storage.exists(Path::new("/work/.kustomization/output.yaml")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crashing_tool_reports_its_stderr() {
        use std::os::unix::fs::PermissionsExt;

        use crate::{exec::ProcessRunner, storage::LocalStorage};

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("kustomize");
        std::fs::write(
            &tool,
            "#!/bin/sh\necho 'panic: runtime error' >&2\nkill -SEGV $$\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output_dir = dir.path().join(".kustomization");
        let builder = OverlayBuilder::new(
            Arc::new(ProcessRunner),
            Arc::new(LocalStorage),
            tool.to_string_lossy(),
            &output_dir,
        );

        let err = builder
            .build(dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::BuildFailed { exit_code: None, .. }));
        assert!(err.to_string().contains("panic: runtime error"));
        assert!(!output_dir.join(OUTPUT_FILE).exists());
    }
}
