use std::{env, path::PathBuf, sync::OnceLock};

use anyhow::Context;
use config::{Environment, File};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::canonicalize;

use crate::error::{ShipError, ShipResult};

pub static CONFIG_INSTANCE: OnceLock<Settings> = OnceLock::new();

/// Remote kustomize base used when a deployment lists no resources of its own. It declares a
/// `Deployment` named `deployment` with a container named `main-server`.
pub const DEFAULT_BASE_REFERENCE: &str =
    "github.com/tcnksm/waypoint-plugin-kustomize/kustomize/remote-base/default?ref=main";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeploySettings {
    /// Directory (relative to the working directory) receiving the built manifest.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_overlay_tool")]
    pub overlay_tool: String,

    #[serde(default = "default_apply_tool")]
    pub apply_tool: String,

    #[serde(default = "default_base")]
    pub default_base: String,

    /// Upper bound for a single external tool invocation.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            overlay_tool: default_overlay_tool(),
            apply_tool: default_apply_tool(),
            default_base: default_base(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,

    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    #[serde(default = "DeploySettings::default")]
    pub deploy: DeploySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            working_directory: default_working_directory(),
            deploy: DeploySettings::default(),
        }
    }
}

pub fn get_config() -> ShipResult<&'static Settings> {
    CONFIG_INSTANCE
        .get()
        .ok_or_else(|| ShipError::Cli("Config not initialized".to_string()))
}

impl Settings {
    pub fn from_root(root: Option<PathBuf>) -> ShipResult<Self> {
        let curr_dir = std::env::current_dir().context("unable to get working directory")?;
        let root = root.unwrap_or(curr_dir);
        let root = canonicalize(root).context("unable to canonicalize root directory")?;

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut s = config::Config::builder();
        if root.is_file() {
            s = s.add_source(File::from(root.as_path()));
        }
        let s = s
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(File::with_name(&root.join("config").to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("KUSTOSHIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg = s.try_deserialize()?;
        Ok(cfg)
    }

    /// Absolute location of the built manifest directory.
    pub fn output_dir(&self) -> PathBuf {
        self.working_directory.join(&self.deploy.output_dir)
    }
}

fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".kustomization")
}

fn default_overlay_tool() -> String {
    "kustomize".to_string()
}

fn default_apply_tool() -> String {
    "kubectl".to_string()
}

fn default_base() -> String {
    DEFAULT_BASE_REFERENCE.to_string()
}
