//! Error taxonomy for the library. The binary surfaces these through
//! `anyhow` at the CLI boundary.

use rust_decimal::Decimal;

use crate::currency::Currency;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown currency: '{0}'")]
    CurrencyNotFound(String),

    #[error("insufficient funds: available {available:.4} {currency}, required {required:.4} {currency}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
        currency: Currency,
    },

    #[error("rate provider request failed: {0}")]
    ApiRequest(String),

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("not logged in; run 'login' first")]
    NotLoggedIn,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
