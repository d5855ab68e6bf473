use std::path::PathBuf;

use clap::Parser;
use kustoship_common::{
    metadata::LevelFilter,
    util::tracing::{level_from_log, setup_tracing},
};

use crate::{error::ShipCliResult, init::init_config};

pub(crate) mod deploy;
mod info;
mod render;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Shorthand for `--log-level debug`.
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Defaults to `log_level` from the settings.
    #[clap(short('l'), long, value_name("LEVEL"))]
    pub log_level: Option<LevelFilter>,

    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Parser, Clone)]
pub enum Command {
    #[command(about = "Show build and configuration information")]
    Info(info::InfoArgs),
    #[command(about = "Build the overlay for an image and apply it", alias = "d")]
    Deploy(Box<deploy::DeployArgs>),
    #[command(about = "Print the generated overlay and patch without deploying", alias = "r")]
    Render(Box<render::RenderArgs>),
}

impl Cli {
    fn level(&self, configured: log::LevelFilter) -> LevelFilter {
        if self.verbose {
            return LevelFilter::DEBUG;
        }
        self.log_level.unwrap_or_else(|| level_from_log(configured))
    }
}

pub async fn exec() -> ShipCliResult {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let cfg = match init_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            // main reports the error through tracing.
            setup_tracing(Some(cli.level(log::LevelFilter::Info)));
            return Err(e.into());
        }
    };
    setup_tracing(Some(cli.level(cfg.log_level)));

    match cli.cmd {
        Command::Info(args) => info::run(args, cfg).await?,
        Command::Deploy(args) => deploy::run(*args, cfg).await?,
        Command::Render(args) => render::run(*args, cfg).await?,
    }
    Ok(())
}
