use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxboard::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch once and display rates, indices and movers
    Show,
    /// Keep the dashboard refreshing until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => match config_path {
            Some(path) => fxboard::cli::setup::setup_at_path(path),
            None => fxboard::cli::setup::setup(),
        },
        Some(Commands::Show) => fxboard::run_command(fxboard::AppCommand::Show, config_path).await,
        Some(Commands::Watch) => fxboard::run_command(fxboard::AppCommand::Watch, config_path).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
