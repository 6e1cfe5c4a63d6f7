pub mod auth;
pub mod cli;
pub mod config;
pub mod convert;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod log;
pub mod rates;
pub mod storage;

pub use error::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::currency::Currency;
use crate::ledger::{PortfolioLedger, Side};
use crate::rates::coingecko::CoinGeckoProvider;
use crate::rates::exchangerate::ExchangeRateProvider;
use crate::rates::{QuoteProvider, QuoteSource, RateStore, UpdatePipeline};
use crate::storage::{JsonDatabase, PortfolioRepository, RatesRepository};

pub enum AppCommand {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    Portfolio { base: Currency },
    Buy { currency: Currency, amount: Decimal },
    Sell { currency: Currency, amount: Decimal },
    Rate { from: Currency, to: Currency },
    UpdateRates { source: Option<QuoteSource> },
    Rates {
        currency: Option<Currency>,
        base: Currency,
        top: Option<usize>,
    },
    History,
}

pub struct App {
    config: AppConfig,
    store: Arc<RateStore>,
    pipeline: UpdatePipeline,
    ledger: Arc<PortfolioLedger>,
    auth: Authenticator,
}

impl App {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = Arc::new(JsonDatabase::new(&config.data_dir()?)?);

        // Warm start the store from the last persisted quotes.
        let store = Arc::new(RateStore::new());
        store.commit(db.load_quotes()?);

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();
        if let Some(coingecko) = &config.providers.coingecko {
            providers.push(Arc::new(CoinGeckoProvider::new(
                &coingecko.base_url,
                timeout,
            )));
        }
        if let Some(exchangerate) = &config.providers.exchangerate {
            providers.push(Arc::new(ExchangeRateProvider::new(
                &exchangerate.base_url,
                config.exchangerate_api_key(),
                timeout,
            )));
        }
        let pipeline = UpdatePipeline::new(
            providers,
            Arc::clone(&store),
            Some(Arc::clone(&db) as Arc<dyn RatesRepository>),
        );

        let ledger = Arc::new(PortfolioLedger::new(
            Arc::clone(&db) as Arc<dyn PortfolioRepository>
        ));
        let auth = Authenticator::new(db, Arc::clone(&ledger), config.initial_balance);

        Ok(App {
            config,
            store,
            pipeline,
            ledger,
            auth,
        })
    }

    pub async fn dispatch(&self, command: AppCommand) -> anyhow::Result<()> {
        match command {
            AppCommand::Register { username, password } => {
                let user_id = self.auth.register(&username, &password)?;
                println!(
                    "User '{username}' registered (id={user_id}). Log in with: \
                     login --username {username} --password {}",
                    "*".repeat(password.len())
                );
            }
            AppCommand::Login { username, password } => {
                let session = self.auth.login(&username, &password)?;
                println!("Logged in as '{}'", session.username);
            }
            AppCommand::Logout => {
                self.auth.logout()?;
                println!("Logged out.");
            }
            AppCommand::Portfolio { base } => {
                let session = self.auth.current()?;
                let balances = self.ledger.balances(session.user_id)?;
                let snapshot = self.store.snapshot();
                println!(
                    "{}",
                    cli::portfolio::render_portfolio(&session.username, &balances, base, &snapshot)
                );
            }
            AppCommand::Buy { currency, amount } => {
                self.trade(Side::Buy, currency, amount)?;
            }
            AppCommand::Sell { currency, amount } => {
                self.trade(Side::Sell, currency, amount)?;
            }
            AppCommand::Rate { from, to } => {
                let snapshot = self.store.snapshot();
                let detail = convert::rate_detail(from, to, &snapshot)?;
                println!(
                    "{}",
                    cli::rates::render_rate_detail(&detail, self.config.rates_ttl_secs)
                );
            }
            AppCommand::UpdateRates { source } => {
                let sources = match source {
                    Some(source) => vec![source],
                    None => vec![QuoteSource::Crypto, QuoteSource::Fiat],
                };
                let spinner = cli::ui::new_spinner("Fetching rates...");
                let result = self.pipeline.run(&sources).await?;
                spinner.finish_and_clear();
                println!("{}", cli::rates::render_update_result(&result));
                if result.all_failed() {
                    anyhow::bail!("every rate source failed; nothing was updated");
                }
            }
            AppCommand::Rates {
                currency,
                base,
                top,
            } => {
                let snapshot = self.store.snapshot();
                println!(
                    "{}",
                    cli::rates::render_rates_table(&snapshot, currency, base, top)?
                );
                if let Some(observed_at) = snapshot.newest_observation() {
                    let age = chrono::Utc::now() - observed_at;
                    if age > chrono::Duration::seconds(self.config.rates_ttl_secs as i64) {
                        warn!("Quotes are {}s old, beyond the configured TTL", age.num_seconds());
                        println!(
                            "{}",
                            cli::ui::style_text(
                                "Quotes are stale; run 'update-rates' to refresh.",
                                cli::ui::StyleType::Subtle
                            )
                        );
                    }
                }
            }
            AppCommand::History => {
                let session = self.auth.current()?;
                let records = self.ledger.history(session.user_id)?;
                println!("{}", cli::trade::render_history(&records));
            }
        }
        Ok(())
    }

    fn trade(&self, side: Side, currency: Currency, amount: Decimal) -> anyhow::Result<()> {
        let session = self.auth.current()?;
        let snapshot = self.store.snapshot();
        let old_balance = self
            .ledger
            .balances(session.user_id)?
            .get(&currency)
            .copied()
            .unwrap_or_default();

        let record = self.ledger.trade(
            session.user_id,
            side,
            currency,
            amount,
            Currency::Usd,
            &snapshot,
        )?;

        let new_balance = self
            .ledger
            .balances(session.user_id)?
            .get(&currency)
            .copied()
            .unwrap_or_default();
        println!(
            "{}",
            cli::trade::render_trade(&record, old_balance, new_balance)
        );
        Ok(())
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> anyhow::Result<()> {
    info!("Valuta starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::new(config)?;
    app.dispatch(command).await
}
