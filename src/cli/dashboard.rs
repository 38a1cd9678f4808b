use super::ui;
use crate::core::config::AppConfig;
use crate::core::{MoverRecord, RateSource, Snapshot};
use comfy_table::{Cell, Color, Table};

fn rates_table(snapshot: &Snapshot, config: &AppConfig) -> Table {
    let quote = &config.quote_currency;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Value ({quote})")),
        ui::header_cell("Change"),
        ui::header_cell("Source"),
    ]);

    for rate in &snapshot.rates {
        let name = config
            .currencies
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(&rate.symbol))
            .and_then(|c| c.name.as_deref());
        let label = match name {
            Some(name) => format!("{name} ({}/{quote})", rate.symbol),
            None => format!("{}/{quote}", rate.symbol),
        };
        let source = match rate.source {
            RateSource::Unavailable => Cell::new(rate.source).fg(Color::Red),
            RateSource::Cross => Cell::new(rate.source).fg(Color::Yellow),
            RateSource::Primary => Cell::new(rate.source),
        };

        table.add_row(vec![
            Cell::new(label),
            ui::format_optional_cell(rate.value, |v| format!("{v:.4}")),
            ui::change_cell(rate.change_pct),
            source,
        ]);
    }
    table
}

fn indices_table(snapshot: &Snapshot) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Index"),
        ui::header_cell("Last"),
        ui::header_cell("Change"),
        ui::header_cell("1M"),
    ]);

    for index in &snapshot.indices {
        let closes: Vec<f64> = index.series.iter().map(|(_, close)| *close).collect();
        let trend = if closes.is_empty() {
            Cell::new(ui::style_text("no data available", ui::StyleType::Subtle))
        } else {
            Cell::new(ui::sparkline(&closes)).fg(Color::Blue)
        };
        table.add_row(vec![
            Cell::new(&index.name),
            ui::format_optional_cell(index.last, |v| format!("{v:.2}")),
            ui::change_cell(index.change_pct),
            trend,
        ]);
    }
    table
}

fn movers_table(title: &str, movers: &[MoverRecord]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(title),
        ui::header_cell("Last"),
        ui::header_cell("Change"),
        ui::header_cell("Volume"),
    ]);

    for mover in movers {
        table.add_row(vec![
            Cell::new(&mover.symbol),
            ui::format_optional_cell(Some(mover.last_price), |v| format!("{v:.2}")),
            ui::change_cell(Some(mover.change_pct)),
            ui::format_optional_cell(mover.volume, |v| v.to_string()),
        ]);
    }
    table
}

/// Renders a snapshot as a set of terminal tables.
pub fn render(snapshot: &Snapshot, config: &AppConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", ui::style_text("Currencies", ui::StyleType::Title)));
    out.push_str(&format!("{}\n\n", rates_table(snapshot, config)));

    out.push_str(&format!("{}\n", ui::style_text("Indices", ui::StyleType::Title)));
    out.push_str(&format!("{}\n\n", indices_table(snapshot)));

    let n = config.movers;
    out.push_str(&format!(
        "{}\n",
        ui::style_text(&format!("Top {n} gainers and losers"), ui::StyleType::Title)
    ));
    if snapshot.movers.gainers.is_empty() {
        out.push_str(&format!(
            "{}\n",
            ui::style_text("No equity data available", ui::StyleType::Error)
        ));
    } else {
        out.push_str(&format!("{}\n", movers_table("Gainers", &snapshot.movers.gainers)));
        out.push_str(&format!("{}\n", movers_table("Losers", &snapshot.movers.losers)));
    }

    out.push_str(&ui::style_text(
        &format!(
            "Updated {}",
            snapshot.refreshed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        ui::StyleType::Subtle,
    ));
    out
}
