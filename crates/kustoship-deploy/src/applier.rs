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
};

/// Hands the built manifest to `<apply-tool> apply -f`. Nothing is rolled back on failure.
pub struct ClusterApplier {
    runner: Arc<dyn CommandRunner>,
    program: String,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ClusterApplier {
    pub fn new<P: Into<String>, D: Into<PathBuf>>(
        runner: Arc<dyn CommandRunner>,
        program: P,
        working_dir: D,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn apply(&self, manifest: &Path, cancel: &CancellationToken) -> DeployResult {
        // Relative to the working directory when possible, which keeps logged command lines short.
        let target = manifest
            .strip_prefix(&self.working_dir)
            .unwrap_or(manifest)
            .to_string_lossy()
            .into_owned();
        let request = CommandRequest::new(&self.program, &self.working_dir)
            .arg("apply")
            .arg("-f")
            .arg(target)
            .with_timeout(self.timeout);
        info!("Applying manifest with `{}`", request.display());

        let output = self
            .runner
            .run(&request, cancel)
            .await
            .map_err(|e| e.at(DeployStage::Apply))?;

        if !output.success() {
            return Err(DeployError::ApplyFailed {
                exit_code: output.exit_code,
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
            });
        }
        debug!("{} apply:\n{}", self.program, output.stdout_lossy());
        Ok(())
    }
}
