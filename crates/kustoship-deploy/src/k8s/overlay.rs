use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{DeploymentConfig, ResolvedConfig},
    error::{DeployError, DeployResult},
    identity::DeploymentIdentity,
};

pub const KUSTOMIZATION_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const KUSTOMIZATION_KIND: &str = "Kustomization";

/// Label carrying the deployment name on every resource kustomize emits.
pub const NAME_LABEL: &str = "name";

/// In-memory `kustomization.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDocument {
    pub api_version: String,
    pub kind: String,
    pub name_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub resources: Vec<String>,
    pub common_labels: BTreeMap<String, String>,
    pub patches_strategic_merge: Vec<String>,
}

impl OverlayDocument {
    pub fn from_resolved(config: &ResolvedConfig, identity: &DeploymentIdentity) -> Self {
        let mut common_labels = config.common_labels.clone();
        common_labels.insert(NAME_LABEL.to_string(), identity.name.clone());

        Self {
            api_version: KUSTOMIZATION_API_VERSION.to_string(),
            kind: KUSTOMIZATION_KIND.to_string(),
            name_suffix: format!("-{}", identity.name),
            namespace: config.namespace.clone(),
            resources: config.resources.clone(),
            common_labels,
            patches_strategic_merge: config.patches_strategic_merge.clone(),
        }
    }

    pub fn to_yaml(&self) -> DeployResult<String> {
        serde_yaml::to_string(self).map_err(|source| DeployError::Encode {
            document: "kustomization",
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OverlayDocumentBuilder {
    default_base: String,
}

impl OverlayDocumentBuilder {
    pub fn new<T: Into<String>>(default_base: T) -> Self {
        Self {
            default_base: default_base.into(),
        }
    }

    /// Resolve `config` and lay it out as an overlay for `identity`. The derived name always wins
    /// the `name` label.
    pub fn build(
        &self,
        config: &DeploymentConfig,
        identity: &DeploymentIdentity,
    ) -> DeployResult<OverlayDocument> {
        let resolved = config.resolve(&self.default_base)?;
        Ok(OverlayDocument::from_resolved(&resolved, identity))
    }
}
