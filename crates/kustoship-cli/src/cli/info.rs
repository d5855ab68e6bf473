use clap::Parser;
use kustoship_common::settings::Settings;
use kustoship_deploy::builder::OUTPUT_FILE;

use crate::error::ShipCliResult;

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

pub async fn run(_args: InfoArgs, config: &Settings) -> ShipCliResult<()> {
    println!(
        "{} {} ({})",
        env!("CARGO_PKG_VERSION"),
        build_value(option_env!("VERGEN_BUILD_DATE")),
        short_sha(option_env!("VERGEN_GIT_SHA"))
    );
    println!("working directory: {}", config.working_directory.display());
    println!("manifest: {}", config.output_dir().join(OUTPUT_FILE).display());
    println!(
        "tools: {} build, {} apply",
        config.deploy.overlay_tool, config.deploy.apply_tool
    );
    Ok(())
}

/// vergen emits this in place of values it cannot determine, e.g. outside a git checkout.
const VERGEN_PLACEHOLDER: &str = "VERGEN_";

fn build_value(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.is_empty() && !value.starts_with(VERGEN_PLACEHOLDER) => value,
        _ => "unknown",
    }
}

fn short_sha(sha: Option<&str>) -> &str {
    let sha = build_value(sha);
    sha.get(..8).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha(Some("4f2a9c1d8e7b6a50")), "4f2a9c1d");
        assert_eq!(short_sha(Some("4f2a")), "4f2a");
        assert_eq!(short_sha(None), "unknown");
        assert_eq!(short_sha(Some("")), "unknown");
    }

    #[test]
    fn test_vergen_placeholder_is_unknown() {
        assert_eq!(short_sha(Some("VERGEN_IDEMPOTENT_OUTPUT")), "unknown");
        assert_eq!(build_value(Some("VERGEN_IDEMPOTENT_OUTPUT")), "unknown");
        assert_eq!(build_value(Some("2026-10-19")), "2026-10-19");
    }
}
