use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use crate::{
    config::check_safe,
    error::{DeployError, DeployResult},
    identity::DeploymentIdentity,
};

/// Must match the `Deployment` declared by the base so kustomize can merge into it.
pub const DEPLOYMENT_NAME: &str = "deployment";
pub const CONTAINER_NAME: &str = "main-server";

pub const ID_LABEL: &str = "kustoship.io/id";
/// Changes on every deploy so the pod template always differs from the previous rollout.
pub const NONCE_ANNOTATION: &str = "kustoship.io/nonce";

/// Strategic-merge patch pinning the image, identity and environment of the main container.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub deployment: Deployment,
}

impl PatchDocument {
    pub fn to_yaml(&self) -> DeployResult<String> {
        serde_yaml::to_string(&self.deployment).map_err(|source| DeployError::Encode {
            document: "deployment patch",
            source,
        })
    }

    pub fn container(&self) -> Option<&Container> {
        self.deployment
            .spec
            .as_ref()?
            .template
            .spec
            .as_ref()?
            .containers
            .first()
    }

    pub fn nonce(&self) -> Option<&str> {
        self.deployment
            .spec
            .as_ref()?
            .template
            .metadata
            .as_ref()?
            .annotations
            .as_ref()?
            .get(NONCE_ANNOTATION)
            .map(String::as_str)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PatchDocumentBuilder;

impl PatchDocumentBuilder {
    pub fn build(
        &self,
        image: &str,
        identity: &DeploymentIdentity,
        env: &BTreeMap<String, String>,
    ) -> DeployResult<PatchDocument> {
        self.build_at(image, identity, env, Utc::now())
    }

    /// Same as [`PatchDocumentBuilder::build`] with an explicit nonce timestamp.
    pub fn build_at(
        &self,
        image: &str,
        identity: &DeploymentIdentity,
        env: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> DeployResult<PatchDocument> {
        check_safe("image", image)?;
        if image.chars().any(char::is_whitespace) {
            return Err(DeployError::invalid(
                "image",
                image,
                "must not contain whitespace",
            ));
        }
        for key in env.keys() {
            check_safe("env name", key)?;
            if key.contains('=') {
                return Err(DeployError::invalid("env name", key, "must not contain '='"));
            }
        }

        // BTreeMap iteration keeps the env list sorted by name.
        let env = env
            .iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect();

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(DEPLOYMENT_NAME.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(BTreeMap::from([(
                            ID_LABEL.to_string(),
                            identity.id.clone(),
                        )])),
                        annotations: Some(BTreeMap::from([(
                            NONCE_ANNOTATION.to_string(),
                            now.to_rfc3339_opts(SecondsFormat::Nanos, true),
                        )])),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: CONTAINER_NAME.to_string(),
                            image: Some(image.to_string()),
                            env: Some(env),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(PatchDocument { deployment })
    }
}
