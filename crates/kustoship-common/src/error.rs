pub type ShipResult<T = (), E = ShipError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("CLI error: {0}")]
    Cli(String),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Interrupted")]
    Interrupted,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to run command: {0}")]
    FailedToRunCommand(String),
    #[error("Invalid Json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("Invalid Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

impl ShipError {
    /// Process exit status for this error: 130 after an interrupt, 2 for bad input or config.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 130,
            Self::Cli(_) | Self::Config(_) | Self::FileNotFound(_) | Self::InvalidInput(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(ShipError::Interrupted.exit_code(), 130);
        assert_eq!(ShipError::InvalidInput("app".to_string()).exit_code(), 2);
        assert_eq!(
            ShipError::FailedToRunCommand("kustomize build".to_string()).exit_code(),
            1
        );
    }
}
