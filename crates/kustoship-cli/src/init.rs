use kustoship_common::{
    error::{ShipError, ShipResult},
    fs_utils::resolve_against,
    settings::{get_config, Settings, CONFIG_INSTANCE},
};

use crate::Cli;

/// Load the layered settings once for the whole process. A relative working directory is taken
/// relative to `--root` when one is given.
pub fn init_config(cli: &Cli) -> ShipResult<&'static Settings> {
    let mut settings = match &cli.settings {
        None => Settings::from_root(cli.root.clone())?,
        Some(settings) => Settings::from_root(Some(settings.clone()))?,
    };
    if let Some(root) = &cli.root {
        if root.is_dir() {
            settings.working_directory = resolve_against(root, &settings.working_directory);
        }
    }
    CONFIG_INSTANCE
        .set(settings)
        .map_err(|_| ShipError::Cli("Config already initialized".to_string()))?;
    get_config()
}
