use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::currency::Currency;
use crate::error::{Error, Result};
use crate::rates::provider::QuoteProvider;
use crate::rates::{Quote, QuoteSource};

/// Fiat quote feed backed by ExchangeRate-API.
///
/// The API returns units of each currency per one USD; prices are inverted
/// into the USD pivot before quotes are built. The USD pivot itself is
/// emitted at exactly 1 so a fiat refresh always makes USD convertible.
pub struct ExchangeRateProvider {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ExchangeRateProvider {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        ExchangeRateProvider {
            base_url: base_url.to_string(),
            api_key,
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(alias = "rates")]
    conversion_rates: HashMap<String, f64>,
}

#[async_trait]
impl QuoteProvider for ExchangeRateProvider {
    fn source(&self) -> QuoteSource {
        QuoteSource::Fiat
    }

    fn display_name(&self) -> &'static str {
        "ExchangeRate-API"
    }

    #[instrument(name = "ExchangeRateFetch", skip(self))]
    async fn fetch(&self) -> Result<Vec<Quote>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ApiRequest("missing EXCHANGERATE_API_KEY".to_string()))?;

        let url = format!("{}/{}/latest/USD", self.base_url, api_key);
        debug!("Requesting fiat quotes from {}/<key>/latest/USD", self.base_url);

        let client = reqwest::Client::builder()
            .user_agent("valuta/0.2")
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::ApiRequest(format!("client setup failed: {e}")))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ApiRequest(format!("ExchangeRate-API request error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ApiRequest(format!(
                "ExchangeRate-API HTTP error: {}",
                response.status()
            )));
        }

        let data = response
            .json::<LatestRatesResponse>()
            .await
            .map_err(|e| Error::ApiRequest(format!("ExchangeRate-API parse error: {e}")))?;

        let observed_at = Utc::now();
        let mut quotes = vec![Quote {
            currency: Currency::Usd,
            price_usd: Decimal::ONE,
            observed_at,
            source: QuoteSource::Fiat,
        }];

        for currency in Currency::fiat() {
            if currency == Currency::Usd {
                continue;
            }
            let Some(per_usd) = data.conversion_rates.get(currency.code()) else {
                debug!("No rate for {currency} in ExchangeRate-API response");
                continue;
            };
            let Ok(per_usd) = Decimal::try_from(*per_usd) else {
                continue;
            };
            if per_usd <= Decimal::ZERO {
                continue;
            }
            quotes.push(Quote {
                currency,
                price_usd: Decimal::ONE / per_usd,
                observed_at,
                source: QuoteSource::Fiat,
            });
        }

        debug!("Fetched {} fiat quotes", quotes.len());
        Ok(quotes)
    }
}
