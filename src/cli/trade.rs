use rust_decimal::Decimal;

use super::ui;
use crate::ledger::{Side, TradeRecord};

/// Renders the outcome of an executed trade with the balance movement of
/// the traded currency.
pub fn render_trade(record: &TradeRecord, old_balance: Decimal, new_balance: Decimal) -> String {
    let action = match record.side {
        Side::Buy => "Bought",
        Side::Sell => "Sold",
    };
    let value_label = match record.side {
        Side::Buy => "Cost",
        Side::Sell => "Proceeds",
    };

    let mut output = format!(
        "{action} {:.4} {} at {:.2} {}/{}\n",
        record.amount, record.currency, record.unit_price, record.quote_currency, record.currency
    );
    output.push_str("Portfolio changes:\n");
    output.push_str(&format!(
        "- {}: {old_balance:.4} -> {new_balance:.4}\n",
        record.currency
    ));
    output.push_str(&format!(
        "{value_label}: {}",
        ui::style_text(
            &format!("{:.2} {}", record.cost(), record.quote_currency),
            ui::StyleType::TotalValue
        )
    ));
    output
}

/// Renders a user's trade history, oldest first.
pub fn render_history(records: &[TradeRecord]) -> String {
    if records.is_empty() {
        return "No trades yet.".to_string();
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Side"),
        ui::header_cell("Currency"),
        ui::header_cell("Amount"),
        ui::header_cell("Unit Price"),
        ui::header_cell("Quoted In"),
    ]);

    for record in records {
        table.add_row(vec![
            comfy_table::Cell::new(record.executed_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ui::side_cell(record.side),
            comfy_table::Cell::new(record.currency.code()),
            ui::money_cell(record.amount, 4),
            ui::money_cell(record.unit_price, 2),
            comfy_table::Cell::new(record.quote_currency.code()),
        ]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn record(side: Side) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            user_id: 1,
            side,
            currency: Currency::Btc,
            amount: dec!(0.02),
            quote_currency: Currency::Usd,
            unit_price: dec!(50000),
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn buy_output_shows_rate_movement_and_cost() {
        let output = render_trade(&record(Side::Buy), dec!(0), dec!(0.02));
        assert!(output.contains("Bought 0.0200 BTC at 50000.00 USD/BTC"));
        assert!(output.contains("- BTC: 0.0000 -> 0.0200"));
        assert!(output.contains("1000.00 USD"));
        assert!(output.contains("Cost"));
    }

    #[test]
    fn sell_output_reports_proceeds() {
        let output = render_trade(&record(Side::Sell), dec!(0.02), dec!(0));
        assert!(output.contains("Sold"));
        assert!(output.contains("Proceeds"));
    }

    #[test]
    fn history_renders_one_row_per_trade() {
        let output = render_history(&[record(Side::Buy), record(Side::Sell)]);
        assert!(output.contains("BUY"));
        assert!(output.contains("SELL"));
        assert!(output.contains("50000.00"));

        assert_eq!(render_history(&[]), "No trades yet.");
    }
}
