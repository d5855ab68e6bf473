//! Error types for the deployment pipeline.

use std::path::PathBuf;

use kustoship_common::error::ShipError;
use thiserror::Error;

pub type DeployResult<T = (), E = DeployError> = Result<T, E>;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployStage {
    /// Resolving the caller's configuration.
    Config,
    /// Deployment id and name assignment.
    Identity,
    /// Rendering the overlay and patch documents.
    Documents,
    /// Writing the transient documents.
    Write,
    /// Running the overlay build tool.
    Build,
    /// Running the cluster apply tool.
    Apply,
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Identity => write!(f, "identity"),
            Self::Documents => write!(f, "documents"),
            Self::Write => write!(f, "write"),
            Self::Build => write!(f, "build"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// Why an in-flight tool invocation was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Requested,
    /// The per-invocation deadline elapsed.
    Deadline,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "cancellation requested"),
            Self::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    /// Caller input rejected before any I/O took place.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("unable to generate deployment id: {0}")]
    Identity(String),

    #[error("unable to encode {document}: {source}")]
    Encode {
        document: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{stage} failed on {}: {source}", path.display())]
    Io {
        stage: DeployStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool binary could not be started at all.
    #[error("{stage} failed: unable to execute {program}: {source}")]
    Spawn {
        stage: DeployStage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("overlay build failed ({}):\n{stderr}", describe_exit(*exit_code))]
    BuildFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("cluster apply failed ({}):\n{stdout}{stderr}", describe_exit(*exit_code))]
    ApplyFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{stage} cancelled: {reason}")]
    Cancelled {
        stage: DeployStage,
        reason: CancelReason,
    },
}

/// `None` means the tool was killed by a signal.
fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit code {c}"),
    )
}

impl DeployError {
    pub(crate) fn invalid(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(stage: DeployStage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// The stage the pipeline was in when this error was raised.
    pub fn stage(&self) -> DeployStage {
        match self {
            Self::InvalidInput { .. } => DeployStage::Config,
            Self::Identity(_) => DeployStage::Identity,
            Self::Encode { .. } => DeployStage::Documents,
            Self::Io { stage, .. } | Self::Spawn { stage, .. } | Self::Cancelled { stage, .. } => {
                *stage
            }
            Self::BuildFailed { .. } => DeployStage::Build,
            Self::ApplyFailed { .. } => DeployStage::Apply,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<DeployError> for ShipError {
    fn from(error: DeployError) -> Self {
        match error {
            DeployError::InvalidInput { .. } => ShipError::InvalidInput(error.to_string()),
            DeployError::Cancelled { .. } => ShipError::Interrupted,
            DeployError::Io { source, .. } => ShipError::IOError(source),
            DeployError::Encode { source, .. } => ShipError::Yaml { source },
            other => ShipError::FailedToRunCommand(other.to_string()),
        }
    }
}
