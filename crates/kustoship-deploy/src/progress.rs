use kustoship_common::{debug, error, info};

use crate::{
    error::{DeployError, DeployStage},
    orchestrator::DeployState,
};

/// Observer for stage transitions of a deploy call.
pub trait Progress: Send + Sync {
    fn stage_started(&self, stage: DeployStage, message: &str);

    fn stage_finished(&self, stage: DeployStage, message: &str);

    fn stage_failed(&self, stage: DeployStage, error: &DeployError);

    fn state_changed(&self, _from: DeployState, _to: DeployState) {}
}

/// Reports stages through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn stage_started(&self, stage: DeployStage, message: &str) {
        info!("[{}] {}", stage, message);
    }

    fn stage_finished(&self, stage: DeployStage, message: &str) {
        info!("[{}] {}", stage, message);
    }

    fn stage_failed(&self, stage: DeployStage, err: &DeployError) {
        error!("[{}] {}", stage, err);
    }

    fn state_changed(&self, from: DeployState, to: DeployState) {
        debug!("{:?} -> {:?}", from, to);
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn stage_started(&self, _stage: DeployStage, _message: &str) {}

    fn stage_finished(&self, _stage: DeployStage, _message: &str) {}

    fn stage_failed(&self, _stage: DeployStage, _error: &DeployError) {}
}
