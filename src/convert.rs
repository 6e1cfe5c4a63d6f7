//! Pure cross-rate conversion over a single rate snapshot.
//!
//! Every currency is priced in the USD pivot, so the rate between any two is
//! `price_usd(from) / price_usd(to)`. A conversion uses exactly one
//! [`RateSnapshot`] end-to-end; a commit landing mid-call can never mix
//! pre- and post-commit prices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::currency::Currency;
use crate::error::Result;
use crate::rates::RateSnapshot;

/// Converts `amount` of `from` into `to` using the snapshot's quotes.
///
/// Converting a currency to itself is an exact identity, not a rate
/// computation, so pass-through queries carry no rounding drift.
pub fn convert(
    amount: Decimal,
    from: Currency,
    to: Currency,
    snapshot: &RateSnapshot,
) -> Result<Decimal> {
    if from == to {
        return Ok(amount);
    }
    let from_price = snapshot.price_usd(from)?;
    let to_price = snapshot.price_usd(to)?;
    Ok(amount * from_price / to_price)
}

/// Unit price of `from` expressed in `to`.
pub fn rate(from: Currency, to: Currency, snapshot: &RateSnapshot) -> Result<Decimal> {
    convert(Decimal::ONE, from, to, snapshot)
}

/// Direct and inverse rate for user-facing display.
#[derive(Debug, Clone)]
pub struct RateDetail {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub inverse: Decimal,
    /// Older of the two quote observations; `None` for an identity pair.
    pub observed_at: Option<DateTime<Utc>>,
}

pub fn rate_detail(from: Currency, to: Currency, snapshot: &RateSnapshot) -> Result<RateDetail> {
    if from == to {
        return Ok(RateDetail {
            from,
            to,
            rate: Decimal::ONE,
            inverse: Decimal::ONE,
            observed_at: None,
        });
    }
    let direct = rate(from, to, snapshot)?;
    let inverse = rate(to, from, snapshot)?;
    let observed_at = snapshot
        .get(from)
        .zip(snapshot.get(to))
        .map(|(a, b)| a.observed_at.min(b.observed_at));
    Ok(RateDetail {
        from,
        to,
        rate: direct,
        inverse,
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::rates::test_support::{quote, usd_quote};
    use crate::rates::{QuoteSource, RateStore};
    use rust_decimal_macros::dec;

    fn snapshot_with_rates() -> RateSnapshot {
        let store = RateStore::new();
        store.commit(vec![
            usd_quote(),
            quote(Currency::Btc, dec!(50000), QuoteSource::Crypto),
            quote(Currency::Eur, dec!(1.25), QuoteSource::Fiat),
        ]);
        store.snapshot()
    }

    #[test]
    fn cross_rate_goes_through_the_usd_pivot() {
        let snapshot = snapshot_with_rates();

        // 0.02 BTC -> USD
        assert_eq!(
            convert(dec!(0.02), Currency::Btc, Currency::Usd, &snapshot).unwrap(),
            dec!(1000)
        );
        // 1 BTC -> EUR: 50000 / 1.25
        assert_eq!(
            convert(dec!(1), Currency::Btc, Currency::Eur, &snapshot).unwrap(),
            dec!(40000)
        );
        // 100 EUR -> USD
        assert_eq!(
            convert(dec!(100), Currency::Eur, Currency::Usd, &snapshot).unwrap(),
            dec!(125)
        );
    }

    #[test]
    fn exact_decimal_inputs_stay_exact() {
        let snapshot = snapshot_with_rates();
        let result = convert(dec!(0.1), Currency::Btc, Currency::Usd, &snapshot).unwrap();
        // 0.1 * 50000 must be exactly 5000, not 4999.999...
        assert_eq!(result, dec!(5000.0));
    }

    #[test]
    fn identity_conversion_returns_the_input_unchanged() {
        // Even an empty snapshot: identity is not a rate computation.
        let snapshot = RateStore::new().snapshot();
        let amount = dec!(123.456789);
        assert_eq!(
            convert(amount, Currency::Sol, Currency::Sol, &snapshot).unwrap(),
            amount
        );
    }

    #[test]
    fn missing_quote_fails_naming_the_code() {
        let snapshot = snapshot_with_rates();

        let err = convert(dec!(1), Currency::Sol, Currency::Usd, &snapshot).unwrap_err();
        assert!(matches!(err, Error::CurrencyNotFound(code) if code == "SOL"));

        let err = convert(dec!(1), Currency::Usd, Currency::Gbp, &snapshot).unwrap_err();
        assert!(matches!(err, Error::CurrencyNotFound(code) if code == "GBP"));
    }

    #[test]
    fn rate_detail_reports_direct_and_inverse() {
        let snapshot = snapshot_with_rates();
        let detail = rate_detail(Currency::Btc, Currency::Usd, &snapshot).unwrap();
        assert_eq!(detail.rate, dec!(50000));
        assert_eq!(detail.inverse, dec!(0.00002));
        assert!(detail.observed_at.is_some());

        let identity = rate_detail(Currency::Usd, Currency::Usd, &snapshot).unwrap();
        assert_eq!(identity.rate, dec!(1));
        assert_eq!(identity.inverse, dec!(1));
        assert!(identity.observed_at.is_none());
    }
}
