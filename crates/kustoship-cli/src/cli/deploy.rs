use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use clap::{Args, Parser};
use kustoship_common::{
    debug, info,
    fs_utils::{find_file_by_name, resolve_against},
    settings::Settings,
    warn,
};
use kustoship_deploy::{DeployRequest, Deployer, DeploymentConfig};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ShipCliError, ShipCliResult},
    ui::TerminalProgress,
};

/// Looked up in the working directory when `--file` is not given.
const DEFAULT_CONFIG_FILES: &[&str] = &["kustoship.yaml", "kustoship.yml"];

/// What to deploy. Shared by `deploy` and `render`.
#[derive(Debug, Args, Clone)]
pub struct TargetArgs {
    #[arg(short, long)]
    pub app: String,

    #[arg(short, long)]
    pub image: String,

    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    #[arg(short, long)]
    pub namespace: Option<String>,

    #[arg(long = "resource", value_name = "RESOURCE")]
    pub resources: Vec<String>,

    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,

    #[arg(long = "patch", value_name = "PATCH")]
    pub patches: Vec<String>,

    /// Deployment config file; flags are layered on top of it.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Kill a tool that runs longer than this many seconds.
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl TargetArgs {
    pub fn to_request(&self, config: &Settings) -> ShipCliResult<DeployRequest> {
        let file_config = self.load_file(config)?.unwrap_or_default();
        let flags = DeploymentConfig {
            namespace: self.namespace.clone(),
            resources: self.resources.clone(),
            common_labels: self.labels.iter().cloned().collect(),
            patches_strategic_merge: self.patches.clone(),
        };

        Ok(DeployRequest {
            app_name: self.app.clone(),
            image: self.image.clone(),
            env: self.env.iter().cloned().collect::<BTreeMap<_, _>>(),
            config: file_config.merge(flags),
        })
    }

    fn load_file(&self, config: &Settings) -> ShipCliResult<Option<DeploymentConfig>> {
        let path = match &self.file {
            Some(file) => resolve_against(&config.working_directory, file),
            None => match find_file_by_name(&config.working_directory, DEFAULT_CONFIG_FILES) {
                Ok(path) => path,
                Err(_) => return Ok(None),
            },
        };
        debug!("Reading deployment config from {}", path.display());
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| ShipCliError::ParseConfig(format!("{}: {}", path.display(), e)))?;
        let parsed: DeploymentConfig = serde_yaml::from_str(&contents)?;
        Ok(Some(parsed))
    }
}

pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))
}

pub async fn run(args: DeployArgs, config: &Settings) -> ShipCliResult<()> {
    let request = args.target.to_request(config)?;
    let deployer = Deployer::new(config).with_timeout(
        args.timeout
            .or(config.deploy.timeout_secs)
            .map(Duration::from_secs),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = scopeguard::guard(
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping the running tool");
                on_signal.cancel();
            }
        }),
        |handle| handle.abort(),
    );

    let progress = scopeguard::guard(TerminalProgress::new(), |progress| progress.finish());
    let result = deployer.deploy(&request, &*progress, &cancel).await;
    drop(progress);
    drop(signal);

    let deployment = result?;
    info!("Deployed {}", deployment.name);
    println!("id: {}", deployment.id);
    println!("name: {}", deployment.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(args: &[&str]) -> TargetArgs {
        let mut argv = vec!["deploy"];
        argv.extend_from_slice(args);
        DeployArgs::try_parse_from(argv).unwrap().target
    }

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            working_directory: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("DATABASE_URL=postgres://db/app?sslmode=disable").unwrap(),
            (
                "DATABASE_URL".to_string(),
                "postgres://db/app?sslmode=disable".to_string()
            )
        );
        assert_eq!(
            parse_key_val("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_key_val("PORT").is_err());
    }

    #[test]
    fn test_flags_become_request() {
        let dir = tempfile::tempdir().unwrap();
        let args = target(&[
            "--app",
            "web",
            "--image",
            "example-app:1.0.0",
            "-e",
            "PORT=8080",
            "-e",
            "MODE=prod",
            "--namespace",
            "example",
            "--resource",
            "r1.yaml",
            "--label",
            "team=web",
            "--patch",
            "p1.yaml",
        ]);

        let request = args.to_request(&settings(dir.path())).unwrap();
        assert_eq!(request.app_name, "web");
        assert_eq!(request.image, "example-app:1.0.0");
        assert_eq!(request.env.len(), 2);
        assert_eq!(request.env["PORT"], "8080");
        assert_eq!(request.config.namespace.as_deref(), Some("example"));
        assert_eq!(request.config.resources, vec!["r1.yaml"]);
        assert_eq!(request.config.common_labels["team"], "web");
        assert_eq!(request.config.patches_strategic_merge, vec!["p1.yaml"]);
    }

    #[test]
    fn test_flags_layer_over_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kustoship.yaml"),
            "namespace: staging\nresources:\n- base.yaml\ncommon_labels:\n  team: api\n",
        )
        .unwrap();

        let args = target(&[
            "--app",
            "web",
            "--image",
            "example-app:1.0.0",
            "--namespace",
            "prod",
            "--resource",
            "extra.yaml",
        ]);
        let request = args.to_request(&settings(dir.path())).unwrap();
        assert_eq!(request.config.namespace.as_deref(), Some("prod"));
        assert_eq!(request.config.resources, vec!["base.yaml", "extra.yaml"]);
        assert_eq!(request.config.common_labels["team"], "api");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = target(&["--app", "web", "--image", "x:1", "--file", "nope.yaml"]);
        let err = args.to_request(&settings(dir.path())).unwrap_err();
        assert!(matches!(err, ShipCliError::ParseConfig(_)));
    }
}
