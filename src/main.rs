use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use valuta::currency::Currency;
use valuta::log::init_logging;
use valuta::rates::QuoteSource;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for valuta::AppCommand {
    fn from(cmd: Commands) -> valuta::AppCommand {
        match cmd {
            Commands::Register { username, password } => {
                valuta::AppCommand::Register { username, password }
            }
            Commands::Login { username, password } => {
                valuta::AppCommand::Login { username, password }
            }
            Commands::Logout => valuta::AppCommand::Logout,
            Commands::Portfolio { base } => valuta::AppCommand::Portfolio { base },
            Commands::Buy { currency, amount } => valuta::AppCommand::Buy { currency, amount },
            Commands::Sell { currency, amount } => valuta::AppCommand::Sell { currency, amount },
            Commands::Rate { from, to } => valuta::AppCommand::Rate { from, to },
            Commands::UpdateRates { source } => valuta::AppCommand::UpdateRates { source },
            Commands::Rates {
                currency,
                base,
                top,
            } => valuta::AppCommand::Rates {
                currency,
                base,
                top,
            },
            Commands::History => valuta::AppCommand::History,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Register a new user
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in as an existing user
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log out of the current session
    Logout,
    /// Display holdings valued in a base currency
    Portfolio {
        #[arg(long, default_value = "USD")]
        base: Currency,
    },
    /// Buy a currency, paying in USD
    Buy {
        #[arg(long)]
        currency: Currency,
        #[arg(long)]
        amount: Decimal,
    },
    /// Sell a currency for USD
    Sell {
        #[arg(long)]
        currency: Currency,
        #[arg(long)]
        amount: Decimal,
    },
    /// Show the rate between two currencies
    Rate {
        #[arg(long)]
        from: Currency,
        #[arg(long, default_value = "USD")]
        to: Currency,
    },
    /// Fetch fresh quotes from the external providers
    UpdateRates {
        /// Limit the update to one source (crypto or fiat)
        #[arg(long)]
        source: Option<QuoteSource>,
    },
    /// List cached quotes
    Rates {
        #[arg(long)]
        currency: Option<Currency>,
        #[arg(long, default_value = "USD")]
        base: Currency,
        /// Show only the n highest-priced quotes
        #[arg(long)]
        top: Option<usize>,
    },
    /// Display the trade history of the current user
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => valuta::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = valuta::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
providers:
  coingecko:
    base_url: "https://api.coingecko.com"
  exchangerate:
    base_url: "https://v6.exchangerate-api.com/v6"
    # api_key: "..."  # or set EXCHANGERATE_API_KEY

initial_balance: 50000
rates_ttl_secs: 300
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
