use std::time::Duration;

use console::{style, Emoji, Term};
use indicatif::{ProgressBar, ProgressStyle};
use kustoship_deploy::{DeployError, DeployStage, Progress};

static TAG: Emoji<'_, '_> = Emoji("🏷️  ", "");
static SCROLL: Emoji<'_, '_> = Emoji("📜 ", "");
static PENCIL: Emoji<'_, '_> = Emoji("✏️  ", "");
static HAMMER: Emoji<'_, '_> = Emoji("🔨 ", "");
static TRUCK: Emoji<'_, '_> = Emoji("🚚 ", "");

const STEPS: usize = 5;

/// Step number and icon shown for a stage. Config errors surface before any step starts.
fn step(stage: DeployStage) -> Option<(usize, &'static Emoji<'static, 'static>)> {
    match stage {
        DeployStage::Config => None,
        DeployStage::Identity => Some((1, &TAG)),
        DeployStage::Documents => Some((2, &SCROLL)),
        DeployStage::Write => Some((3, &PENCIL)),
        DeployStage::Build => Some((4, &HAMMER)),
        DeployStage::Apply => Some((5, &TRUCK)),
    }
}

/// `[n/5]` step lines with a spinner underneath while a tool runs.
pub struct TerminalProgress {
    spinner: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let spinner = if Term::stderr().is_term() {
            let spinner = ProgressBar::new_spinner();
            if let Ok(spinner_style) =
                ProgressStyle::with_template("{prefix:.bold.dim} {spinner} {wide_msg}")
            {
                spinner.set_style(spinner_style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };
        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for TerminalProgress {
    fn stage_started(&self, stage: DeployStage, message: &str) {
        if let Some((n, icon)) = step(stage) {
            self.spinner.println(format!(
                "{} {}{}",
                style(format!("[{n}/{STEPS}]")).bold().dim(),
                icon,
                message
            ));
        }
        self.spinner.set_message(message.to_string());
    }

    fn stage_finished(&self, _stage: DeployStage, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    fn stage_failed(&self, stage: DeployStage, error: &DeployError) {
        self.spinner.println(format!(
            "{} {}",
            style(format!("{stage} failed:")).red().bold(),
            error
        ));
    }
}
