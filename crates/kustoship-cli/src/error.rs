use kustoship_common::error::ShipError;
use kustoship_deploy::DeployError;
use thiserror::Error;

pub type ShipCliResult<T = (), E = ShipCliError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum ShipCliError {
    #[error("Unable to initialize config: {0}")]
    InitConfig(String),
    #[error("Unable to parse config: {0}")]
    ParseConfig(String),
    #[error("Unable to run command: {0}")]
    Command(#[from] clap::error::Error),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<ShipCliError> for ShipError {
    fn from(error: ShipCliError) -> Self {
        match error {
            ShipCliError::InitConfig(e) => ShipError::Cli(e),
            ShipCliError::ParseConfig(e) => ShipError::Cli(e),
            ShipCliError::Command(e) => ShipError::Cli(e.to_string()),
            ShipCliError::Deploy(e) => e.into(),
            ShipCliError::Runtime(e) => ShipError::Cli(e),
        }
    }
}

impl From<ShipError> for ShipCliError {
    fn from(error: ShipError) -> Self {
        match error {
            ShipError::Config(e) => ShipCliError::InitConfig(e.to_string()),
            other => ShipCliError::Runtime(other.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for ShipCliError {
    fn from(error: serde_yaml::Error) -> Self {
        ShipCliError::ParseConfig(error.to_string())
    }
}

impl From<serde_json::Error> for ShipCliError {
    fn from(error: serde_json::Error) -> Self {
        ShipCliError::Runtime(error.to_string())
    }
}
