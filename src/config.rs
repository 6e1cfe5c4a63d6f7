use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateConfig {
    pub base_url: String,
    /// Falls back to the EXCHANGERATE_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoConfig>,
    pub exchangerate: Option<ExchangeRateConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoConfig {
                base_url: "https://api.coingecko.com".to_string(),
            }),
            exchangerate: Some(ExchangeRateConfig {
                base_url: "https://v6.exchangerate-api.com/v6".to_string(),
                api_key: None,
            }),
        }
    }
}

fn default_initial_balance() -> Decimal {
    Decimal::from(50_000)
}

fn default_rates_ttl_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Where users.json, portfolios.json, rates.json and friends live.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Starting USD allocation credited at registration.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Age beyond which cached quotes are reported as stale.
    #[serde(default = "default_rates_ttl_secs")]
    pub rates_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            data_dir: None,
            initial_balance: default_initial_balance(),
            rates_ttl_secs: default_rates_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Resolved data directory for the JSON database.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// ExchangeRate-API key from config, with environment fallback.
    pub fn exchangerate_api_key(&self) -> Option<String> {
        self.providers
            .exchangerate
            .as_ref()
            .and_then(|p| p.api_key.clone())
            .or_else(|| std::env::var("EXCHANGERATE_API_KEY").ok())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("in", "codito", "valuta")
            .context("Could not determine project directories")
    }
}
