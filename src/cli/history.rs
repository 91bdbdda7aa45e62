//! The `history` command: render the append-only evaluation log.

use anyhow::Result;
use comfy_table::Cell;

use super::ui;
use crate::core::config::AppConfig;
use crate::store::EvaluationLog;

pub fn run(config: &AppConfig) -> Result<()> {
    let log = EvaluationLog::open(&config.data_path()?.join("evaluations"))?;
    let records = log.list_all()?;

    if records.is_empty() {
        println!("No evaluations recorded yet.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Symbol"),
        ui::header_cell("EPS"),
        ui::header_cell("Growth"),
        ui::header_cell("Discount"),
        ui::header_cell("Model"),
        ui::header_cell("Intrinsic"),
        ui::header_cell("Buy Below"),
        ui::header_cell("Price"),
        ui::header_cell("Verdict"),
    ]);

    for record in &records {
        table.add_row(vec![
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(&record.symbol),
            Cell::new(format!("{:.2}", record.eps)),
            Cell::new(format!("{:.2}%", record.growth_pct)),
            Cell::new(format!("{:.2}%", record.discount_pct)),
            Cell::new(record.mode.to_string()),
            Cell::new(format!("{:.2}", record.intrinsic_value)),
            Cell::new(format!("{:.2}", record.buy_below)),
            ui::format_optional_cell(record.price, |p| format!("{p:.2}")),
            ui::label_cell(record.label),
        ]);
    }

    println!("{table}");
    Ok(())
}
