use super::ui;
use crate::core::{ConversionService, CurrencyList};
use anyhow::Result;

const CODES_PER_ROW: usize = 8;

/// Renders the currency codes as a grid, `CODES_PER_ROW` to a row.
pub fn render_currency_table(list: &CurrencyList) -> String {
    let mut table = ui::new_styled_table();
    for row in list.codes.chunks(CODES_PER_ROW) {
        table.add_row(row.iter().map(|code| ui::code_cell(code)));
    }
    table.to_string()
}

pub async fn run(service: &ConversionService) -> Result<()> {
    let spinner = ui::new_spinner("Fetching currencies...");
    let list = service.list_available_currencies().await;
    spinner.finish_and_clear();

    if let Some(notice) = &list.notice {
        eprintln!("{}", ui::style_text(notice, ui::StyleType::Error));
    }

    println!(
        "{} {}\n",
        ui::style_text("Available currencies", ui::StyleType::Title),
        ui::style_text(&format!("({})", list.codes.len()), ui::StyleType::Subtle)
    );
    println!("{}", render_currency_table(&list));
    if let Some(as_of) = list.as_of {
        println!(
            "\n{}",
            ui::style_text(
                &format!("Rates as of {}", as_of.format("%Y-%m-%d %H:%M UTC")),
                ui::StyleType::Subtle
            )
        );
    }

    Ok(())
}
