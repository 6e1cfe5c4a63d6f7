//! Quote model and the copy-on-write rate store.

pub mod coingecko;
pub mod exchangerate;
pub mod pipeline;
pub mod provider;

pub use pipeline::{UpdatePipeline, UpdateResult};
pub use provider::QuoteProvider;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::currency::Currency;
use crate::error::{Error, Result};

/// Which external feed a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    Crypto,
    Fiat,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSource::Crypto => f.write_str("crypto"),
            QuoteSource::Fiat => f.write_str("fiat"),
        }
    }
}

impl std::str::FromStr for QuoteSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "crypto" | "coingecko" => Ok(QuoteSource::Crypto),
            "fiat" | "exchangerate" => Ok(QuoteSource::Fiat),
            other => Err(Error::Invalid(format!(
                "unknown source '{other}', expected 'crypto' or 'fiat'"
            ))),
        }
    }
}

/// One currency's price in the USD pivot at a point in time.
///
/// Invariant: `price_usd > 0`. Providers drop non-positive entries before a
/// quote is ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub currency: Currency,
    pub price_usd: Decimal,
    pub observed_at: DateTime<Utc>,
    pub source: QuoteSource,
}

/// Immutable, consistent view of all quotes at one instant.
///
/// Cloning is cheap (an `Arc` bump); every multi-step computation takes one
/// snapshot up front and uses it end-to-end.
#[derive(Debug, Clone, Default)]
pub struct RateSnapshot {
    quotes: Arc<HashMap<Currency, Quote>>,
}

impl RateSnapshot {
    pub fn get(&self, currency: Currency) -> Option<&Quote> {
        self.quotes.get(&currency)
    }

    /// Price of one unit of `currency` in USD, failing with
    /// [`Error::CurrencyNotFound`] when the snapshot has no quote for it.
    pub fn price_usd(&self, currency: Currency) -> Result<Decimal> {
        self.quotes
            .get(&currency)
            .map(|q| q.price_usd)
            .ok_or_else(|| Error::CurrencyNotFound(currency.code().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.values()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Timestamp of the most recently observed quote, if any.
    pub fn newest_observation(&self) -> Option<DateTime<Utc>> {
        self.quotes.values().map(|q| q.observed_at).max()
    }
}

/// Latest committed quote per currency.
///
/// Writers build a fresh map and swap the `Arc` under a short write lock, so
/// readers holding a [`RateSnapshot`] never observe a half-applied commit.
pub struct RateStore {
    current: RwLock<Arc<HashMap<Currency, Quote>>>,
}

impl RateStore {
    pub fn new() -> Self {
        RateStore {
            current: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Replaces the entry of every currency present in `quotes` in one
    /// atomic swap. Currencies absent from the batch are left untouched; an
    /// empty batch is a no-op.
    pub fn commit(&self, quotes: Vec<Quote>) {
        if quotes.is_empty() {
            return;
        }
        let mut current = self.current.write().unwrap();
        let mut next = (**current).clone();
        for quote in quotes {
            debug!(
                currency = %quote.currency,
                price_usd = %quote.price_usd,
                source = %quote.source,
                "Committing quote"
            );
            next.insert(quote.currency, quote);
        }
        *current = Arc::new(next);
    }

    pub fn snapshot(&self) -> RateSnapshot {
        RateSnapshot {
            quotes: Arc::clone(&self.current.read().unwrap()),
        }
    }

    pub fn get(&self, currency: Currency) -> Option<Quote> {
        self.current.read().unwrap().get(&currency).cloned()
    }
}

impl Default for RateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn quote(currency: Currency, price_usd: Decimal, source: QuoteSource) -> Quote {
        Quote {
            currency,
            price_usd,
            observed_at: Utc::now(),
            source,
        }
    }

    pub fn usd_quote() -> Quote {
        quote(Currency::Usd, dec!(1), QuoteSource::Fiat)
    }
}
