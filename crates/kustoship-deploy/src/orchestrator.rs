//! Sequencing of a single deploy call.
//!
//! `Start → IdentityAssigned → DocumentsBuilt → ManifestsWritten → Built → Applied → Done`, with
//! `Failed` reachable from every non-terminal state. The transient overlay and patch are removed as
//! soon as the build tool has consumed them, or on the way out of a failed call. The final manifest
//! is left in the output directory either way.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use kustoship_common::{settings::Settings, trace};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    applier::ClusterApplier,
    builder::OverlayBuilder,
    config::DeploymentConfig,
    error::{DeployResult, DeployStage},
    exec::{CommandRunner, ProcessRunner},
    identity::{DeploymentIdentity, DeploymentResult, IdGenerator, IdentityAssigner},
    k8s::{OverlayDocument, OverlayDocumentBuilder, PatchDocument, PatchDocumentBuilder},
    progress::Progress,
    storage::{LocalStorage, Storage},
    writer::ManifestWriter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Start,
    IdentityAssigned,
    DocumentsBuilt,
    ManifestsWritten,
    Built,
    Applied,
    Done,
    Failed,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Everything a caller supplies for one deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
    pub app_name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub config: DeploymentConfig,
}

impl DeployRequest {
    pub fn new<A: Into<String>, I: Into<String>>(app_name: A, image: I) -> Self {
        Self {
            app_name: app_name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, config: DeploymentConfig) -> Self {
        self.config = config;
        self
    }
}

/// Output of [`Deployer::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocuments {
    pub identity: DeploymentIdentity,
    pub overlay_yaml: String,
    pub patch_yaml: String,
}

pub struct Deployer {
    working_dir: PathBuf,
    output_dir: PathBuf,
    overlay_tool: String,
    apply_tool: String,
    default_base: String,
    timeout: Option<Duration>,
    storage: Arc<dyn Storage>,
    runner: Arc<dyn CommandRunner>,
    identities: IdentityAssigner,
}

impl Deployer {
    /// A deployer running the configured tools against the local filesystem.
    pub fn new(settings: &Settings) -> Self {
        Self {
            working_dir: settings.working_directory.clone(),
            output_dir: settings.output_dir(),
            overlay_tool: settings.deploy.overlay_tool.clone(),
            apply_tool: settings.deploy.apply_tool.clone(),
            default_base: settings.deploy.default_base.clone(),
            timeout: settings.deploy.timeout_secs.map(Duration::from_secs),
            storage: Arc::new(LocalStorage),
            runner: Arc::new(ProcessRunner),
            identities: IdentityAssigner::default(),
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_ids<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.identities = IdentityAssigner::new(ids);
        self
    }

    /// Overrides `deploy.timeout_secs` from the settings.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.overlay_builder().manifest_path()
    }

    /// Assign an identity and render both documents without writing anything or running any tool.
    pub fn render(&self, request: &DeployRequest) -> DeployResult<RenderedDocuments> {
        let identity = self.identities.assign(&request.app_name)?;
        let (overlay, patch) = self.documents(request, &identity)?;
        Ok(RenderedDocuments {
            overlay_yaml: overlay.to_yaml()?,
            patch_yaml: patch.to_yaml()?,
            identity,
        })
    }

    pub async fn deploy(
        &self,
        request: &DeployRequest,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> DeployResult<DeploymentResult> {
        let mut state = Transitions::new(progress);
        match self.run(request, &mut state, cancel).await {
            Ok(result) => {
                state.advance(DeployState::Done);
                Ok(result)
            }
            Err(err) => {
                progress.stage_failed(err.stage(), &err);
                state.advance(DeployState::Failed);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &DeployRequest,
        state: &mut Transitions<'_>,
        cancel: &CancellationToken,
    ) -> DeployResult<DeploymentResult> {
        let progress = state.progress;

        progress.stage_started(DeployStage::Identity, "Assigning deployment identity");
        let identity = self.identities.assign(&request.app_name)?;
        state.advance(DeployState::IdentityAssigned);
        progress.stage_finished(DeployStage::Identity, &identity.name);

        progress.stage_started(DeployStage::Documents, "Rendering overlay and patch");
        let (overlay, patch) = self.documents(request, &identity)?;
        state.advance(DeployState::DocumentsBuilt);
        progress.stage_finished(DeployStage::Documents, "Rendered overlay and patch");

        progress.stage_started(DeployStage::Write, "Writing overlay files");
        let writer = ManifestWriter::new(Arc::clone(&self.storage), &self.working_dir);
        let written = writer.write(&overlay, &patch)?;
        state.advance(DeployState::ManifestsWritten);
        progress.stage_finished(DeployStage::Write, "Wrote overlay files");

        progress.stage_started(DeployStage::Build, "Building final manifest");
        let builder = self.overlay_builder();
        builder.build(&self.working_dir, cancel).await?;
        written.cleanup();
        state.advance(DeployState::Built);
        progress.stage_finished(
            DeployStage::Build,
            &format!("Built {}", builder.manifest_path().display()),
        );

        progress.stage_started(DeployStage::Apply, "Applying manifest");
        ClusterApplier::new(
            Arc::clone(&self.runner),
            &self.apply_tool,
            &self.working_dir,
        )
        .with_timeout(self.timeout)
        .apply(&builder.manifest_path(), cancel)
        .await?;
        state.advance(DeployState::Applied);
        progress.stage_finished(DeployStage::Apply, &identity.name);

        Ok(identity.into())
    }

    fn documents(
        &self,
        request: &DeployRequest,
        identity: &DeploymentIdentity,
    ) -> DeployResult<(OverlayDocument, PatchDocument)> {
        let overlay =
            OverlayDocumentBuilder::new(&self.default_base).build(&request.config, identity)?;
        let patch = PatchDocumentBuilder.build(&request.image, identity, &request.env)?;
        Ok((overlay, patch))
    }

    fn overlay_builder(&self) -> OverlayBuilder {
        OverlayBuilder::new(
            Arc::clone(&self.runner),
            Arc::clone(&self.storage),
            &self.overlay_tool,
            &self.output_dir,
        )
        .with_timeout(self.timeout)
    }
}

struct Transitions<'a> {
    current: DeployState,
    progress: &'a dyn Progress,
}

impl<'a> Transitions<'a> {
    fn new(progress: &'a dyn Progress) -> Self {
        Self {
            current: DeployState::Start,
            progress,
        }
    }

    fn advance(&mut self, next: DeployState) {
        trace!("deploy state {:?} -> {:?}", self.current, next);
        self.progress.state_changed(self.current, next);
        self.current = next;
    }
}
