use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, DeployResult},
    writer::PATCH_FILE,
};

/// Caller-supplied overlay settings. Never mutated by the pipeline; see
/// [`DeploymentConfig::resolve`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentConfig {
    pub namespace: Option<String>,
    pub resources: Vec<String>,
    pub common_labels: BTreeMap<String, String>,
    pub patches_strategic_merge: Vec<String>,
}

/// A validated configuration with every default applied.
///
/// `resources` is never empty and `patches_strategic_merge` always ends with the generated patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub namespace: Option<String>,
    pub resources: Vec<String>,
    pub common_labels: BTreeMap<String, String>,
    pub patches_strategic_merge: Vec<String>,
}

impl DeploymentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace<T: Into<String>>(mut self, namespace: T) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_resource<T: Into<String>>(mut self, resource: T) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn with_label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.common_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_patch<T: Into<String>>(mut self, patch: T) -> Self {
        self.patches_strategic_merge.push(patch.into());
        self
    }

    /// Layer `other` over `self`: a set namespace wins, lists are appended and labels inserted.
    pub fn merge(mut self, other: DeploymentConfig) -> Self {
        if other.namespace.is_some() {
            self.namespace = other.namespace;
        }
        self.resources.extend(other.resources);
        self.common_labels.extend(other.common_labels);
        self.patches_strategic_merge
            .extend(other.patches_strategic_merge);
        self
    }

    /// Validate the caller's strings and apply the defaults, leaving `self` untouched.
    pub fn resolve(&self, default_base: &str) -> DeployResult<ResolvedConfig> {
        if let Some(namespace) = &self.namespace {
            check_safe("namespace", namespace)?;
        }
        for resource in &self.resources {
            check_safe("resource", resource)?;
        }
        for patch in &self.patches_strategic_merge {
            check_safe("patch", patch)?;
            if patch == PATCH_FILE {
                return Err(DeployError::invalid(
                    "patch",
                    patch,
                    "name is reserved for the generated deployment patch",
                ));
            }
        }
        for (key, value) in &self.common_labels {
            check_safe("label key", key)?;
            check_printable("label value", value)?;
        }

        let resources = if self.resources.is_empty() {
            vec![default_base.to_string()]
        } else {
            self.resources.clone()
        };

        let mut patches_strategic_merge = self.patches_strategic_merge.clone();
        patches_strategic_merge.push(PATCH_FILE.to_string());

        Ok(ResolvedConfig {
            namespace: self.namespace.clone(),
            resources,
            common_labels: self.common_labels.clone(),
            patches_strategic_merge,
        })
    }
}

/// Non-empty and free of control characters.
pub(crate) fn check_safe(field: &'static str, value: &str) -> DeployResult<()> {
    if value.trim().is_empty() {
        return Err(DeployError::invalid(field, value, "must not be empty"));
    }
    check_printable(field, value)
}

pub(crate) fn check_printable(field: &'static str, value: &str) -> DeployResult<()> {
    if value.chars().any(char::is_control) {
        return Err(DeployError::invalid(
            field,
            value,
            "contains a control character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployStage;

    const BASE: &str = "github.com/example/base?ref=main";

    #[test]
    fn test_empty_resources_default_to_base() {
        let resolved = DeploymentConfig::new().resolve(BASE).unwrap();
        assert_eq!(resolved.resources, vec![BASE.to_string()]);
        assert_eq!(resolved.patches_strategic_merge, vec![PATCH_FILE.to_string()]);
        assert_eq!(resolved.namespace, None);
    }

    #[test]
    fn test_resolve_keeps_caller_order_and_appends_patch() {
        let config = DeploymentConfig::new()
            .with_namespace("example")
            .with_resource("r1.yaml")
            .with_resource("r2.yaml")
            .with_patch("p1.yaml")
            .with_patch("p2.yaml");

        let resolved = config.resolve(BASE).unwrap();
        assert_eq!(resolved.resources, vec!["r1.yaml", "r2.yaml"]);
        assert_eq!(
            resolved.patches_strategic_merge,
            vec!["p1.yaml", "p2.yaml", PATCH_FILE]
        );
        assert_eq!(resolved.namespace.as_deref(), Some("example"));
    }

    #[test]
    fn test_resolve_does_not_mutate_caller_config() {
        let config = DeploymentConfig::new().with_patch("p1.yaml");
        let before = config.clone();
        config.resolve(BASE).unwrap();
        config.resolve(BASE).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn test_rejects_unsafe_strings() {
        let err = DeploymentConfig::new()
            .with_resource("ok.yaml\nkind: Secret")
            .resolve(BASE)
            .unwrap_err();
        assert_eq!(err.stage(), DeployStage::Config);
        assert!(err.to_string().contains("resource"));

        assert!(DeploymentConfig::new()
            .with_namespace("  ")
            .resolve(BASE)
            .is_err());
        assert!(DeploymentConfig::new()
            .with_patch(PATCH_FILE)
            .resolve(BASE)
            .is_err());
        assert!(DeploymentConfig::new()
            .with_label("tier", "back\tend")
            .resolve(BASE)
            .is_err());
    }

    #[test]
    fn test_empty_label_value_is_allowed() {
        let resolved = DeploymentConfig::new()
            .with_label("team", "")
            .resolve(BASE)
            .unwrap();
        assert_eq!(resolved.common_labels.get("team").map(String::as_str), Some(""));
    }

    #[test]
    fn test_merge_layers_flags_over_file() {
        let file = DeploymentConfig::new()
            .with_namespace("staging")
            .with_resource("base.yaml")
            .with_label("team", "web");
        let flags = DeploymentConfig::new()
            .with_namespace("prod")
            .with_label("team", "api")
            .with_patch("replicas.yaml");

        let merged = file.merge(flags);
        assert_eq!(merged.namespace.as_deref(), Some("prod"));
        assert_eq!(merged.resources, vec!["base.yaml"]);
        assert_eq!(merged.common_labels["team"], "api");
        assert_eq!(merged.patches_strategic_merge, vec!["replicas.yaml"]);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let config: DeploymentConfig = serde_yaml::from_str(
            "namespace: example\nresources:\n- r1.yaml\ncommon_labels:\n  app: web\n",
        )
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("example"));
        assert_eq!(config.resources, vec!["r1.yaml"]);
        assert_eq!(config.common_labels["app"], "web");
        assert!(config.patches_strategic_merge.is_empty());
    }
}
