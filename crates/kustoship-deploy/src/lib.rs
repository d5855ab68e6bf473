//! Kustomize overlay composition and the build/apply deployment pipeline.
//!
//! A deploy call assigns an identity, renders a `kustomization.yaml` plus a strategic-merge patch
//! for the image, runs `kustomize build` into a durable manifest and hands that manifest to
//! `kubectl apply`.

pub mod applier;
pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod identity;
pub mod k8s;
pub mod orchestrator;
pub mod progress;
pub mod storage;
pub mod writer;

pub use config::{DeploymentConfig, ResolvedConfig};
pub use error::{CancelReason, DeployError, DeployResult, DeployStage};
pub use identity::{DeploymentIdentity, DeploymentResult, IdentityAssigner};
pub use orchestrator::{DeployRequest, DeployState, Deployer, RenderedDocuments};
pub use progress::{LogProgress, Progress};
