//! User registration, login and the persisted CLI session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::{Error, Result};
use crate::ledger::PortfolioLedger;
use crate::storage::JsonDatabase;

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registered_at: DateTime<Utc>,
}

/// The logged-in user, persisted so one-shot CLI invocations share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
}

pub struct Authenticator {
    db: Arc<JsonDatabase>,
    ledger: Arc<PortfolioLedger>,
    initial_balance: Decimal,
}

impl Authenticator {
    pub fn new(
        db: Arc<JsonDatabase>,
        ledger: Arc<PortfolioLedger>,
        initial_balance: Decimal,
    ) -> Self {
        Authenticator {
            db,
            ledger,
            initial_balance,
        }
    }

    /// Creates a new user and credits the starting USD allocation.
    pub fn register(&self, username: &str, password: &str) -> Result<u64> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Invalid("username must not be empty".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::Invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut users = self.db.load_users();
        if users.iter().any(|u| u.username == username) {
            return Err(Error::Invalid(format!(
                "username '{username}' is already taken"
            )));
        }

        let user_id = users.iter().map(|u| u.user_id).max().unwrap_or(0) + 1;
        let salt = Uuid::new_v4().simple().to_string()[..8].to_string();
        users.push(UserRecord {
            user_id,
            username: username.to_string(),
            hashed_password: hash_password(password, &salt),
            salt,
            registered_at: Utc::now(),
        });
        self.db.save_users(&users)?;

        if self.initial_balance > Decimal::ZERO {
            self.ledger
                .deposit(user_id, Currency::Usd, self.initial_balance)?;
        }

        info!(user_id, username, "Registered new user");
        Ok(user_id)
    }

    /// Verifies credentials and persists the session.
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        let users = self.db.load_users();
        let user = users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| Error::Auth(format!("user '{username}' not found")))?;

        if hash_password(password, &user.salt) != user.hashed_password {
            return Err(Error::Auth("invalid password".to_string()));
        }

        let session = Session {
            user_id: user.user_id,
            username: user.username.to_string(),
        };
        self.db.save_session(&session)?;
        info!(user_id = user.user_id, username, "Logged in");
        Ok(session)
    }

    pub fn logout(&self) -> Result<()> {
        self.db.clear_session()
    }

    /// The current session, or [`Error::NotLoggedIn`].
    pub fn current(&self) -> Result<Session> {
        self.db.load_session().ok_or(Error::NotLoggedIn)
    }
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
