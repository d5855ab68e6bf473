//! Child process capability. The pipeline only talks to external tools through [`CommandRunner`].

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use kustoship_common::{debug, warn};
use tokio::{io::AsyncReadExt, process::Command};
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, DeployError, DeployStage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Kill the child once this elapses.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new<P: Into<String>, D: Into<PathBuf>>(program: P, cwd: D) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            timeout: None,
        }
    }

    pub fn arg<A: Into<String>>(mut self, arg: A) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-escaped command line, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| shell_escape::escape(Cow::from(s.as_str())))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("unable to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Cancelled(CancelReason),
}

impl ExecError {
    pub(crate) fn at(self, stage: DeployStage) -> DeployError {
        match self {
            Self::Spawn { program, source } => DeployError::Spawn {
                stage,
                program,
                source,
            },
            Self::Cancelled(reason) => DeployError::Cancelled { stage, reason },
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `request` to completion, capturing both output streams. A non-zero exit is returned as
    /// output, not as an error.
    async fn run(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;
}

/// Runs real child processes with tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled(CancelReason::Requested));
        }
        debug!("Running `{}` in {}", request.display(), request.cwd.display());

        let mut child = command(&request.program, &request.args, &request.cwd)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_all(stdout));
        let stderr_task = tokio::spawn(read_all(stderr));

        let deadline = async {
            match request.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let status = tokio::select! {
            () = cancel.cancelled() => {
                warn!("Cancelling `{}`", request.display());
                child.kill().await.ok();
                return Err(ExecError::Cancelled(CancelReason::Requested));
            }
            () = deadline => {
                warn!("`{}` exceeded its deadline", request.display());
                child.kill().await.ok();
                return Err(ExecError::Cancelled(CancelReason::Deadline));
            }
            status = child.wait() => status.map_err(|source| ExecError::Spawn {
                program: request.program.clone(),
                source,
            })?,
        };

        // Ctrl-C reaches the child's process group too, so it can die before the token is seen.
        if status.code().is_none() && cancel.is_cancelled() {
            return Err(ExecError::Cancelled(CancelReason::Requested));
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn read_all<R: tokio::io::AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            warn!("Unable to read child output: {}", e);
        }
    }
    buf
}

/// Construct a tokio `Command` from a program and its arguments.
pub fn command(program: &str, args: &[String], cwd: &Path) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}
