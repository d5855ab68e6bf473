use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Kubernetes label values and DNS labels share this limit.
pub const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub id: String,
    pub name: String,
}

/// What a successful deploy hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub id: String,
    pub name: String,
}

impl From<DeploymentIdentity> for DeploymentResult {
    fn from(identity: DeploymentIdentity) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
        }
    }
}

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> DeployResult<String>;
}

/// Time-ordered 26 character ULIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn generate(&self) -> DeployResult<String> {
        Ok(ulid::Ulid::new().to_string())
    }
}

pub struct IdentityAssigner {
    ids: Box<dyn IdGenerator>,
}

impl Default for IdentityAssigner {
    fn default() -> Self {
        Self::new(UlidGenerator)
    }
}

impl IdentityAssigner {
    pub fn new<G: IdGenerator + 'static>(ids: G) -> Self {
        Self { ids: Box::new(ids) }
    }

    /// Draw a fresh id and derive `lowercase("{app_name}-{id}")` from it.
    pub fn assign(&self, app_name: &str) -> DeployResult<DeploymentIdentity> {
        if app_name.is_empty() {
            return Err(DeployError::invalid("app name", app_name, "must not be empty"));
        }
        let id = self.ids.generate()?;
        let name = format!("{app_name}-{id}").to_lowercase();
        validate_dns_label(&name)?;
        Ok(DeploymentIdentity { id, name })
    }
}

fn validate_dns_label(name: &str) -> DeployResult<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(DeployError::invalid(
            "app name",
            name,
            format!("deployment name exceeds {MAX_NAME_LEN} characters"),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(DeployError::invalid(
            "app name",
            name,
            "deployment name may only contain letters, digits and '-'",
        ));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(DeployError::invalid(
            "app name",
            name,
            "deployment name must start with a letter or digit",
        ));
    }
    Ok(())
}
