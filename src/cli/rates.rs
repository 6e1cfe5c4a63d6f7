use chrono::{Duration, Utc};

use super::ui;
use crate::convert::{self, RateDetail};
use crate::currency::Currency;
use crate::error::Result;
use crate::rates::{RateSnapshot, UpdateResult};

/// Renders the outcome of an update pass, one line per failed source.
pub fn render_update_result(result: &UpdateResult) -> String {
    let mut lines = Vec::new();
    if result.committed.is_empty() {
        lines.push("No quotes committed.".to_string());
    } else {
        let codes: Vec<&str> = result.committed.iter().map(|c| c.code()).collect();
        lines.push(format!(
            "Updated {} quotes: {}",
            result.committed.len(),
            codes.join(", ")
        ));
    }
    for (source, error) in &result.failed {
        lines.push(ui::style_text(
            &format!("{source} source failed: {error}"),
            ui::StyleType::Error,
        ));
    }
    lines.join("\n")
}

/// Renders the direct and inverse rate for a currency pair.
pub fn render_rate_detail(detail: &RateDetail, ttl_secs: u64) -> String {
    let observed = detail
        .observed_at
        .map_or("N/A".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());

    let mut output = format!(
        "Rate {} -> {}: {:.2} (observed: {observed})\n",
        detail.from, detail.to, detail.rate
    );
    output.push_str(&format!(
        "Inverse {} -> {}: {:.6}",
        detail.to, detail.from, detail.inverse
    ));
    if let Some(observed_at) = detail.observed_at
        && Utc::now() - observed_at > Duration::seconds(ttl_secs as i64)
    {
        output.push('\n');
        output.push_str(&ui::style_text(
            "Quotes are stale; run 'update-rates' to refresh.",
            ui::StyleType::Subtle,
        ));
    }
    output
}

/// Renders the cached quotes as a table, optionally filtered to one
/// currency, re-based to another currency, and truncated to the top `n`
/// prices.
pub fn render_rates_table(
    snapshot: &RateSnapshot,
    currency: Option<Currency>,
    base: Currency,
    top: Option<usize>,
) -> Result<String> {
    if snapshot.is_empty() {
        return Ok("The local rates cache is empty. Run 'update-rates' to fetch quotes.".to_string());
    }

    let mut rows = Vec::new();
    for quote in snapshot.iter() {
        if currency.is_some_and(|c| c != quote.currency) {
            continue;
        }
        let unit_value = convert::rate(quote.currency, base, snapshot)?;
        rows.push((quote, unit_value));
    }

    if rows.is_empty() {
        return Ok(format!(
            "No quote for '{}' in the cache.",
            currency.map_or("?".to_string(), |c| c.code().to_string())
        ));
    }

    match top {
        Some(n) => {
            rows.sort_by(|a, b| b.1.cmp(&a.1));
            rows.truncate(n);
        }
        None => rows.sort_by_key(|(q, _)| q.currency),
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Price ({base})")),
        ui::header_cell("Source"),
        ui::header_cell("Observed"),
    ]);
    for (quote, unit_value) in rows {
        table.add_row(vec![
            comfy_table::Cell::new(quote.currency.code()),
            ui::money_cell(unit_value, 4),
            comfy_table::Cell::new(quote.source.to_string()),
            comfy_table::Cell::new(quote.observed_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }
    Ok(table.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::rates::test_support::{quote, usd_quote};
    use crate::rates::{QuoteSource, RateStore};
    use rust_decimal_macros::dec;

    fn snapshot() -> RateSnapshot {
        let store = RateStore::new();
        store.commit(vec![
            usd_quote(),
            quote(Currency::Btc, dec!(50000), QuoteSource::Crypto),
            quote(Currency::Eth, dec!(3000), QuoteSource::Crypto),
        ]);
        store.snapshot()
    }

    #[test]
    fn update_result_lists_committed_and_failed() {
        let result = UpdateResult {
            committed: vec![Currency::Usd, Currency::Eur],
            failed: vec![(
                QuoteSource::Crypto,
                Error::ApiRequest("timed out".to_string()),
            )],
        };
        let output = render_update_result(&result);
        assert!(output.contains("Updated 2 quotes: USD, EUR"));
        assert!(output.contains("crypto source failed"));
        assert!(output.contains("timed out"));
    }

    #[test]
    fn rates_table_lists_all_quotes_by_default() {
        let output = render_rates_table(&snapshot(), None, Currency::Usd, None).unwrap();
        assert!(output.contains("BTC"));
        assert!(output.contains("ETH"));
        assert!(output.contains("50000.0000"));
    }

    #[test]
    fn rates_table_filters_to_one_currency() {
        let output =
            render_rates_table(&snapshot(), Some(Currency::Btc), Currency::Usd, None).unwrap();
        assert!(output.contains("BTC"));
        assert!(!output.contains("ETH"));
    }

    #[test]
    fn rates_table_top_n_sorts_by_price() {
        let output = render_rates_table(&snapshot(), None, Currency::Usd, Some(1)).unwrap();
        assert!(output.contains("BTC"));
        assert!(!output.contains("ETH"));
    }

    #[test]
    fn empty_cache_suggests_update() {
        let output =
            render_rates_table(&RateStore::new().snapshot(), None, Currency::Usd, None).unwrap();
        assert!(output.contains("update-rates"));
    }

    #[test]
    fn stale_quotes_are_flagged_in_rate_detail() {
        let store = RateStore::new();
        let mut old = quote(Currency::Btc, dec!(50000), QuoteSource::Crypto);
        old.observed_at = Utc::now() - Duration::seconds(600);
        let mut usd = usd_quote();
        usd.observed_at = old.observed_at;
        store.commit(vec![usd, old]);

        let detail = convert::rate_detail(Currency::Btc, Currency::Usd, &store.snapshot()).unwrap();
        let output = render_rate_detail(&detail, 300);
        assert!(output.contains("stale"));

        let fresh = convert::rate_detail(Currency::Btc, Currency::Btc, &store.snapshot()).unwrap();
        assert!(!render_rate_detail(&fresh, 300).contains("stale"));
    }
}
