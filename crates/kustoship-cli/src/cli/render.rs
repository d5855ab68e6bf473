use clap::Parser;
use kustoship_common::settings::Settings;
use kustoship_deploy::{Deployer, RenderedDocuments};

use super::deploy::TargetArgs;
use crate::error::ShipCliResult;

#[derive(Debug, Parser, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print identity and documents as a single JSON object.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RenderArgs, config: &Settings) -> ShipCliResult<()> {
    let request = args.target.to_request(config)?;
    let rendered = Deployer::new(config).render(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        print!("{}", as_yaml_stream(&rendered));
    }
    Ok(())
}

/// Both documents as one YAML stream, overlay first.
fn as_yaml_stream(rendered: &RenderedDocuments) -> String {
    format!(
        "# name: {}\n{}---\n{}",
        rendered.identity.name, rendered.overlay_yaml, rendered.patch_yaml
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kustoship_deploy::DeploymentIdentity;

    #[test]
    fn test_yaml_stream_separates_documents() {
        let rendered = RenderedDocuments {
            identity: DeploymentIdentity {
                id: "01HX3K9QY8V4T2".to_string(),
                name: "web-01hx3k9qy8v4t2".to_string(),
            },
            overlay_yaml: "kind: Kustomization\n".to_string(),
            patch_yaml: "kind: Deployment\n".to_string(),
        };
        assert_eq!(
            as_yaml_stream(&rendered),
            "# name: web-01hx3k9qy8v4t2\nkind: Kustomization\n---\nkind: Deployment\n"
        );
    }
}
