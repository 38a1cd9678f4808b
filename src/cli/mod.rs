pub mod dashboard;
pub mod setup;
pub mod ui;

use crate::core::Orchestrator;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::info;

/// Runs a single refresh and prints it.
pub async fn show(orchestrator: &Orchestrator, config: &AppConfig) -> Result<()> {
    let pb = ui::new_spinner("Fetching quotes...");
    let snapshot = orchestrator.refresh_all().await;
    pb.finish_and_clear();

    println!("{}", dashboard::render(&snapshot, config));
    Ok(())
}

/// Refreshes and redraws every refresh interval until Ctrl-C.
pub async fn watch(orchestrator: &Orchestrator, config: &AppConfig) -> Result<()> {
    let term = console::Term::stdout();
    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = orchestrator.refresh_all().await;
                term.clear_screen()?;
                println!("{}", dashboard::render(&snapshot, config));
                println!(
                    "{}",
                    ui::style_text(
                        &format!("Refreshing every {}s, Ctrl-C to quit", config.refresh_interval().as_secs()),
                        ui::StyleType::Subtle,
                    )
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                ui::print_separator();
                return Ok(());
            }
        }
    }
}
