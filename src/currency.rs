//! The closed set of tradeable currencies.
//!
//! Every rate, balance and trade is keyed by one of these. Keeping the set
//! closed lets the rest of the crate use `Currency` as a cheap `Copy` map
//! key instead of validating free-form codes everywhere.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Rub,
    Btc,
    Eth,
    Sol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

impl Currency {
    pub const ALL: [Currency; 7] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Rub,
        Currency::Btc,
        Currency::Eth,
        Currency::Sol,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Rub => "RUB",
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Sol => "SOL",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Currency::Usd => "US Dollar",
            Currency::Eur => "Euro",
            Currency::Gbp => "British Pound",
            Currency::Rub => "Russian Ruble",
            Currency::Btc => "Bitcoin",
            Currency::Eth => "Ethereum",
            Currency::Sol => "Solana",
        }
    }

    pub fn kind(&self) -> CurrencyKind {
        match self {
            Currency::Usd | Currency::Eur | Currency::Gbp | Currency::Rub => CurrencyKind::Fiat,
            Currency::Btc | Currency::Eth | Currency::Sol => CurrencyKind::Crypto,
        }
    }

    pub fn fiat() -> impl Iterator<Item = Currency> {
        Self::ALL
            .into_iter()
            .filter(|c| c.kind() == CurrencyKind::Fiat)
    }

    pub fn crypto() -> impl Iterator<Item = Currency> {
        Self::ALL
            .into_iter()
            .filter(|c| c.kind() == CurrencyKind::Crypto)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(Error::CurrencyNotFound(code))
    }
}
