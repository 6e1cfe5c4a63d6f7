//! JSON file persistence for users, portfolios, quotes and trade history.
//!
//! Files live in the configured data directory and are written atomically
//! (temp file + rename). A missing or unreadable file reads as empty so a
//! fresh data dir needs no setup step.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Session, UserRecord};
use crate::currency::Currency;
use crate::error::Result;
use crate::ledger::{Balances, TradeRecord};
use crate::rates::{Quote, QuoteSource};

/// Persistence contract for the rate store: warm start and post-commit save.
pub trait RatesRepository: Send + Sync {
    fn load_quotes(&self) -> Result<Vec<Quote>>;
    fn save_quotes(&self, quotes: &[Quote]) -> Result<()>;
    fn append_rate_history(&self, entries: &[RateHistoryEntry]) -> Result<()>;
}

/// Persistence contract for the ledger. `save_balances` must be durable
/// before a trade reports success.
pub trait PortfolioRepository: Send + Sync {
    fn load_balances(&self, user_id: u64) -> Result<Balances>;
    fn save_balances(&self, user_id: u64, balances: &Balances) -> Result<()>;
    fn append_trade(&self, record: &TradeRecord) -> Result<()>;
    fn load_trades(&self, user_id: u64) -> Result<Vec<TradeRecord>>;
}

/// Append-only record of a committed quote, one entry per pipeline pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    pub id: String,
    pub currency: Currency,
    pub price_usd: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: QuoteSource,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RatesFile {
    quotes: Vec<Quote>,
    last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortfolioRecord {
    user_id: u64,
    balances: Balances,
}

pub struct JsonDatabase {
    data_dir: PathBuf,
}

impl JsonDatabase {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(JsonDatabase {
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn load_users(&self) -> Vec<UserRecord> {
        read_or_default(&self.path("users.json"))
    }

    pub fn save_users(&self, users: &[UserRecord]) -> Result<()> {
        write_atomic(&self.path("users.json"), &users)
    }

    pub fn load_session(&self) -> Option<Session> {
        read_or_default(&self.path("session.json"))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        write_atomic(&self.path("session.json"), &Some(session))
    }

    pub fn clear_session(&self) -> Result<()> {
        write_atomic(&self.path("session.json"), &Option::<Session>::None)
    }
}

impl RatesRepository for JsonDatabase {
    fn load_quotes(&self) -> Result<Vec<Quote>> {
        let file: RatesFile = read_or_default(&self.path("rates.json"));
        Ok(file.quotes)
    }

    fn save_quotes(&self, quotes: &[Quote]) -> Result<()> {
        let file = RatesFile {
            quotes: quotes.to_vec(),
            last_refresh: Some(Utc::now()),
        };
        write_atomic(&self.path("rates.json"), &file)
    }

    fn append_rate_history(&self, entries: &[RateHistoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let path = self.path("rate_history.json");
        let mut history: Vec<RateHistoryEntry> = read_or_default(&path);
        history.extend_from_slice(entries);
        write_atomic(&path, &history)
    }
}

impl PortfolioRepository for JsonDatabase {
    fn load_balances(&self, user_id: u64) -> Result<Balances> {
        let portfolios: Vec<PortfolioRecord> = read_or_default(&self.path("portfolios.json"));
        Ok(portfolios
            .into_iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.balances)
            .unwrap_or_default())
    }

    fn save_balances(&self, user_id: u64, balances: &Balances) -> Result<()> {
        let path = self.path("portfolios.json");
        let mut portfolios: Vec<PortfolioRecord> = read_or_default(&path);
        match portfolios.iter_mut().find(|p| p.user_id == user_id) {
            Some(record) => record.balances = balances.clone(),
            None => portfolios.push(PortfolioRecord {
                user_id,
                balances: balances.clone(),
            }),
        }
        write_atomic(&path, &portfolios)
    }

    fn append_trade(&self, record: &TradeRecord) -> Result<()> {
        let path = self.path("trades.json");
        let mut trades: Vec<TradeRecord> = read_or_default(&path);
        trades.push(record.clone());
        write_atomic(&path, &trades)
    }

    fn load_trades(&self, user_id: u64) -> Result<Vec<TradeRecord>> {
        let trades: Vec<TradeRecord> = read_or_default(&self.path("trades.json"));
        Ok(trades.into_iter().filter(|t| t.user_id == user_id).collect())
    }
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            debug!("No data at {}, starting empty", path.display());
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
