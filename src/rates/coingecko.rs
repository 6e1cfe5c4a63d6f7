use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::currency::Currency;
use crate::error::{Error, Result};
use crate::rates::provider::QuoteProvider;
use crate::rates::{Quote, QuoteSource};

fn coin_id(currency: Currency) -> &'static str {
    match currency {
        Currency::Btc => "bitcoin",
        Currency::Eth => "ethereum",
        Currency::Sol => "solana",
        // Fiat currencies are never requested from this provider.
        _ => unreachable!("not a CoinGecko asset: {currency}"),
    }
}

/// Crypto quote feed backed by the CoinGecko simple price API.
pub struct CoinGeckoProvider {
    base_url: String,
    timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        CoinGeckoProvider {
            base_url: base_url.to_string(),
            timeout,
        }
    }
}

// Response shape: {"bitcoin": {"usd": 50000.0}, ...}
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

#[async_trait]
impl QuoteProvider for CoinGeckoProvider {
    fn source(&self) -> QuoteSource {
        QuoteSource::Crypto
    }

    fn display_name(&self) -> &'static str {
        "CoinGecko"
    }

    #[instrument(name = "CoinGeckoFetch", skip(self))]
    async fn fetch(&self) -> Result<Vec<Quote>> {
        let ids = Currency::crypto()
            .map(coin_id)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url, ids
        );
        debug!("Requesting crypto quotes from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("valuta/0.2")
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::ApiRequest(format!("client setup failed: {e}")))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ApiRequest(format!("CoinGecko request error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ApiRequest(format!(
                "CoinGecko HTTP error: {}",
                response.status()
            )));
        }

        let data = response
            .json::<SimplePriceResponse>()
            .await
            .map_err(|e| Error::ApiRequest(format!("CoinGecko parse error: {e}")))?;

        let observed_at = Utc::now();
        let mut quotes = Vec::new();
        for currency in Currency::crypto() {
            let Some(price) = data.get(coin_id(currency)).and_then(|c| c.get("usd")) else {
                debug!("No USD price for {currency} in CoinGecko response");
                continue;
            };
            let Ok(price_usd) = Decimal::try_from(*price) else {
                continue;
            };
            if price_usd <= Decimal::ZERO {
                continue;
            }
            quotes.push(Quote {
                currency,
                price_usd,
                observed_at,
                source: QuoteSource::Crypto,
            });
        }

        debug!("Fetched {} crypto quotes", quotes.len());
        Ok(quotes)
    }
}
