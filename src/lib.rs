pub mod cli;
pub mod core;
pub mod providers;

use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Show,
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxboard starting...");

    let config = match config_path {
        Some(path) => core::config::AppConfig::load_from_path(path)?,
        None => core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let orchestrator = core::Orchestrator::from_config(&config)?;

    match command {
        AppCommand::Show => cli::show(&orchestrator, &config).await,
        AppCommand::Watch => cli::watch(&orchestrator, &config).await,
    }
}
