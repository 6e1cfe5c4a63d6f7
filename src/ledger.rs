//! Per-user balances and the atomic buy/sell transaction.
//!
//! Mutations for one user are serialised behind that user's mutex; a trade's
//! debit and credit legs are applied together or not at all. Trades from
//! different users proceed independently.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::convert;
use crate::currency::Currency;
use crate::error::{Error, Result};
use crate::rates::RateSnapshot;
use crate::storage::PortfolioRepository;

/// A user's holdings. Absent currencies were never held; a zero entry was
/// held and spent down. No balance is ever negative.
pub type Balances = BTreeMap<Currency, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Immutable record of one executed trade, appended to the user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub user_id: u64,
    pub side: Side,
    pub currency: Currency,
    pub amount: Decimal,
    pub quote_currency: Currency,
    /// Price of one unit of `currency` in `quote_currency` at execution.
    pub unit_price: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Total value moved on the quote-currency leg.
    pub fn cost(&self) -> Decimal {
        self.amount * self.unit_price
    }
}

pub struct PortfolioLedger {
    accounts: RwLock<HashMap<u64, Arc<Mutex<Balances>>>>,
    repository: Arc<dyn PortfolioRepository>,
}

impl PortfolioLedger {
    pub fn new(repository: Arc<dyn PortfolioRepository>) -> Self {
        PortfolioLedger {
            accounts: RwLock::new(HashMap::new()),
            repository,
        }
    }

    /// The user's account cell, loading persisted balances on first touch.
    fn account(&self, user_id: u64) -> Result<Arc<Mutex<Balances>>> {
        if let Some(account) = self.accounts.read().unwrap().get(&user_id) {
            return Ok(Arc::clone(account));
        }
        let mut accounts = self.accounts.write().unwrap();
        // Another caller may have loaded it while we waited for the lock.
        if let Some(account) = accounts.get(&user_id) {
            return Ok(Arc::clone(account));
        }
        let balances = self.repository.load_balances(user_id)?;
        let account = Arc::new(Mutex::new(balances));
        accounts.insert(user_id, Arc::clone(&account));
        Ok(account)
    }

    /// Executes a buy or sell of `amount` units of `currency`, priced in
    /// `quote_currency` against the given snapshot.
    ///
    /// Both legs are applied atomically: a failed funds check (or a failed
    /// durable save) leaves the balances exactly as they were.
    pub fn trade(
        &self,
        user_id: u64,
        side: Side,
        currency: Currency,
        amount: Decimal,
        quote_currency: Currency,
        snapshot: &RateSnapshot,
    ) -> Result<TradeRecord> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }
        let cost = convert::convert(amount, currency, quote_currency, snapshot)?;
        let unit_price = convert::rate(currency, quote_currency, snapshot)?;

        let account = self.account(user_id)?;
        let mut balances = account.lock().unwrap();

        // Work on a scratch copy; the live balances change only after the
        // funds check passed and the new state is durable.
        let mut next = balances.clone();
        match side {
            Side::Buy => {
                let available = next.get(&quote_currency).copied().unwrap_or_default();
                if available < cost {
                    return Err(Error::InsufficientFunds {
                        available,
                        required: cost,
                        currency: quote_currency,
                    });
                }
                next.insert(quote_currency, available - cost);
                let held = next.get(&currency).copied().unwrap_or_default();
                next.insert(currency, held + amount);
            }
            Side::Sell => {
                let held = next.get(&currency).copied().unwrap_or_default();
                if held < amount {
                    return Err(Error::InsufficientFunds {
                        available: held,
                        required: amount,
                        currency,
                    });
                }
                next.insert(currency, held - amount);
                let available = next.get(&quote_currency).copied().unwrap_or_default();
                next.insert(quote_currency, available + cost);
            }
        }

        self.repository.save_balances(user_id, &next)?;

        let record = TradeRecord {
            id: Uuid::new_v4(),
            user_id,
            side,
            currency,
            amount,
            quote_currency,
            unit_price,
            executed_at: Utc::now(),
        };
        self.repository.append_trade(&record)?;

        *balances = next;
        info!(
            user_id,
            side = %side,
            currency = %currency,
            amount = %amount,
            unit_price = %unit_price,
            "Trade applied"
        );
        Ok(record)
    }

    /// Credits `amount` of `currency` out of thin air. Used for the starting
    /// allocation at registration, never exposed as a trading operation.
    pub fn deposit(&self, user_id: u64, currency: Currency, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }
        let account = self.account(user_id)?;
        let mut balances = account.lock().unwrap();
        let mut next = balances.clone();
        let held = next.get(&currency).copied().unwrap_or_default();
        next.insert(currency, held + amount);
        self.repository.save_balances(user_id, &next)?;
        *balances = next;
        Ok(())
    }

    pub fn balances(&self, user_id: u64) -> Result<Balances> {
        Ok(self.account(user_id)?.lock().unwrap().clone())
    }

    pub fn history(&self, user_id: u64) -> Result<Vec<TradeRecord>> {
        self.repository.load_trades(user_id)
    }
}
