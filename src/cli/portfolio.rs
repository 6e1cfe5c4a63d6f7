use rust_decimal::Decimal;

use super::ui;
use crate::convert;
use crate::currency::Currency;
use crate::ledger::Balances;
use crate::rates::RateSnapshot;

/// Renders a user's holdings valued in `base` against one snapshot.
///
/// Currencies without a quote in the snapshot show N/A and are left out of
/// the total, mirroring how unpriceable investments are reported elsewhere.
pub fn render_portfolio(
    username: &str,
    balances: &Balances,
    base: Currency,
    snapshot: &RateSnapshot,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Balance"),
        ui::header_cell(&format!("Value ({base})")),
    ]);

    let mut total = Decimal::ZERO;
    let mut all_valued = true;

    for (currency, balance) in balances {
        let value = convert::convert(*balance, *currency, base, snapshot).ok();
        let value_cell = match value {
            Some(v) => {
                total += v;
                ui::money_cell(v, 2)
            }
            None => {
                all_valued = false;
                ui::na_cell(true)
            }
        };
        table.add_row(vec![
            comfy_table::Cell::new(currency.code()),
            ui::money_cell(*balance, 4),
            value_cell,
        ]);
    }

    let total_style = if all_valued {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Error
    };

    let mut output = format!(
        "Portfolio of '{}' (base: {base})\n\n",
        ui::style_text(username, ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\nTotal ({}): {}",
        ui::style_text(base.code(), ui::StyleType::TotalLabel),
        ui::style_text(&format!("{total:.2}"), total_style)
    ));
    if !all_valued {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                "Some holdings have no quote; run 'update-rates' and retry.",
                ui::StyleType::Subtle
            )
        ));
    }
    output
}
