//! Merges quotes from the independent provider feeds into the rate store.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::currency::Currency;
use crate::error::{Error, Result};
use crate::rates::provider::QuoteProvider;
use crate::rates::{Quote, QuoteSource, RateStore};
use crate::storage::{RateHistoryEntry, RatesRepository};

/// Outcome of one pipeline pass: what was committed and which sources broke.
#[derive(Debug)]
pub struct UpdateResult {
    pub committed: Vec<Currency>,
    pub failed: Vec<(QuoteSource, Error)>,
}

impl UpdateResult {
    /// True when every invoked provider failed; the store was left untouched
    /// and the caller should report the whole pass as failed.
    pub fn all_failed(&self) -> bool {
        self.committed.is_empty() && !self.failed.is_empty()
    }
}

pub struct UpdatePipeline {
    providers: Vec<Arc<dyn QuoteProvider>>,
    store: Arc<RateStore>,
    repository: Option<Arc<dyn RatesRepository>>,
}

impl UpdatePipeline {
    pub fn new(
        providers: Vec<Arc<dyn QuoteProvider>>,
        store: Arc<RateStore>,
        repository: Option<Arc<dyn RatesRepository>>,
    ) -> Self {
        UpdatePipeline {
            providers,
            store,
            repository,
        }
    }

    /// Fetches from every provider matching `sources` concurrently, then
    /// commits the union of all successful batches in a single atomic
    /// commit. One provider failing never blocks another's quotes; it is
    /// recorded in [`UpdateResult::failed`] instead.
    ///
    /// Running the pipeline twice with identical provider responses leaves
    /// the store in the same state: commits are full replacements per
    /// currency, not deltas.
    pub async fn run(&self, sources: &[QuoteSource]) -> Result<UpdateResult> {
        info!("Starting rates update for sources: {sources:?}");

        let selected: Vec<&Arc<dyn QuoteProvider>> = self
            .providers
            .iter()
            .filter(|p| sources.contains(&p.source()))
            .collect();

        let outcomes = join_all(selected.iter().map(|p| p.fetch())).await;

        let mut merged: Vec<Quote> = Vec::new();
        let mut failed: Vec<(QuoteSource, Error)> = Vec::new();
        for (provider, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                Ok(quotes) => {
                    info!(
                        "Fetching from {}... OK ({} quotes)",
                        provider.display_name(),
                        quotes.len()
                    );
                    merged.extend(quotes);
                }
                Err(e) => {
                    warn!("Failed to fetch from {}: {}", provider.display_name(), e);
                    failed.push((provider.source(), e));
                }
            }
        }

        let mut committed: Vec<Currency> = merged.iter().map(|q| q.currency).collect();
        committed.sort();

        let history: Vec<RateHistoryEntry> = merged
            .iter()
            .map(|q| RateHistoryEntry {
                id: format!("{}_{}", q.currency, q.observed_at.to_rfc3339()),
                currency: q.currency,
                price_usd: q.price_usd,
                timestamp: q.observed_at,
                source: q.source,
            })
            .collect();

        self.store.commit(merged);

        if !committed.is_empty()
            && let Some(repository) = &self.repository
        {
            let snapshot = self.store.snapshot();
            let quotes: Vec<Quote> = snapshot.iter().cloned().collect();
            repository.save_quotes(&quotes)?;
            repository.append_rate_history(&history)?;
        }

        info!(
            "Rates update finished: {} committed, {} failed",
            committed.len(),
            failed.len()
        );
        Ok(UpdateResult { committed, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::test_support::{quote, usd_quote};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct StaticProvider {
        source: QuoteSource,
        quotes: Vec<Quote>,
    }

    #[async_trait]
    impl QuoteProvider for StaticProvider {
        fn source(&self) -> QuoteSource {
            self.source
        }

        fn display_name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self) -> crate::error::Result<Vec<Quote>> {
            Ok(self.quotes.clone())
        }
    }

    struct FailingProvider {
        source: QuoteSource,
    }

    #[async_trait]
    impl QuoteProvider for FailingProvider {
        fn source(&self) -> QuoteSource {
            self.source
        }

        fn display_name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self) -> crate::error::Result<Vec<Quote>> {
            Err(Error::ApiRequest("connection refused".to_string()))
        }
    }

    fn crypto_quotes() -> Vec<Quote> {
        vec![
            quote(Currency::Btc, dec!(50000), QuoteSource::Crypto),
            quote(Currency::Eth, dec!(3000), QuoteSource::Crypto),
        ]
    }

    fn fiat_quotes() -> Vec<Quote> {
        vec![usd_quote(), quote(Currency::Eur, dec!(1.1), QuoteSource::Fiat)]
    }

    #[tokio::test]
    async fn merges_both_sources_into_one_commit() {
        let store = Arc::new(RateStore::new());
        let pipeline = UpdatePipeline::new(
            vec![
                Arc::new(StaticProvider {
                    source: QuoteSource::Crypto,
                    quotes: crypto_quotes(),
                }),
                Arc::new(StaticProvider {
                    source: QuoteSource::Fiat,
                    quotes: fiat_quotes(),
                }),
            ],
            Arc::clone(&store),
            None,
        );

        let result = pipeline
            .run(&[QuoteSource::Crypto, QuoteSource::Fiat])
            .await
            .unwrap();

        assert!(result.failed.is_empty());
        assert_eq!(
            result.committed,
            vec![Currency::Usd, Currency::Eur, Currency::Btc, Currency::Eth]
        );
        assert_eq!(store.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn one_failing_source_does_not_block_the_other() {
        let store = Arc::new(RateStore::new());
        // Pre-existing crypto quote from an earlier pass.
        store.commit(vec![quote(Currency::Btc, dec!(45000), QuoteSource::Crypto)]);

        let pipeline = UpdatePipeline::new(
            vec![
                Arc::new(FailingProvider {
                    source: QuoteSource::Crypto,
                }),
                Arc::new(StaticProvider {
                    source: QuoteSource::Fiat,
                    quotes: fiat_quotes(),
                }),
            ],
            Arc::clone(&store),
            None,
        );

        let result = pipeline
            .run(&[QuoteSource::Crypto, QuoteSource::Fiat])
            .await
            .unwrap();

        assert_eq!(result.committed, vec![Currency::Usd, Currency::Eur]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, QuoteSource::Crypto);
        assert!(!result.all_failed());

        // Prior crypto quotes stay untouched.
        assert_eq!(store.get(Currency::Btc).unwrap().price_usd, dec!(45000));
        assert_eq!(store.get(Currency::Eur).unwrap().price_usd, dec!(1.1));
    }

    #[tokio::test]
    async fn all_sources_failing_leaves_the_store_untouched() {
        let store = Arc::new(RateStore::new());
        store.commit(vec![quote(Currency::Btc, dec!(45000), QuoteSource::Crypto)]);
        let before = store.snapshot();

        let pipeline = UpdatePipeline::new(
            vec![
                Arc::new(FailingProvider {
                    source: QuoteSource::Crypto,
                }),
                Arc::new(FailingProvider {
                    source: QuoteSource::Fiat,
                }),
            ],
            Arc::clone(&store),
            None,
        );

        let result = pipeline
            .run(&[QuoteSource::Crypto, QuoteSource::Fiat])
            .await
            .unwrap();

        assert!(result.all_failed());
        assert_eq!(result.failed.len(), 2);
        assert_eq!(store.snapshot().len(), before.len());
        assert_eq!(
            store.get(Currency::Btc).unwrap().price_usd,
            before.get(Currency::Btc).unwrap().price_usd
        );
    }

    #[tokio::test]
    async fn only_selected_sources_are_invoked() {
        let store = Arc::new(RateStore::new());
        let pipeline = UpdatePipeline::new(
            vec![
                Arc::new(StaticProvider {
                    source: QuoteSource::Crypto,
                    quotes: crypto_quotes(),
                }),
                Arc::new(FailingProvider {
                    source: QuoteSource::Fiat,
                }),
            ],
            Arc::clone(&store),
            None,
        );

        let result = pipeline.run(&[QuoteSource::Crypto]).await.unwrap();

        // The fiat provider was never invoked, so nothing failed.
        assert!(result.failed.is_empty());
        assert_eq!(result.committed, vec![Currency::Btc, Currency::Eth]);
    }

    #[tokio::test]
    async fn rerun_with_identical_responses_is_idempotent() {
        let store = Arc::new(RateStore::new());
        let pipeline = UpdatePipeline::new(
            vec![Arc::new(StaticProvider {
                source: QuoteSource::Crypto,
                quotes: crypto_quotes(),
            })],
            Arc::clone(&store),
            None,
        );

        pipeline.run(&[QuoteSource::Crypto]).await.unwrap();
        let first: Vec<Quote> = store.snapshot().iter().cloned().collect();

        pipeline.run(&[QuoteSource::Crypto]).await.unwrap();
        let second = store.snapshot();

        assert_eq!(first.len(), second.len());
        for q in first {
            assert_eq!(second.get(q.currency).unwrap().price_usd, q.price_usd);
        }
    }

    #[tokio::test]
    async fn committed_quotes_are_persisted_for_warm_start() {
        use crate::storage::JsonDatabase;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let db = Arc::new(JsonDatabase::new(dir.path()).unwrap());
        let store = Arc::new(RateStore::new());
        let pipeline = UpdatePipeline::new(
            vec![Arc::new(StaticProvider {
                source: QuoteSource::Crypto,
                quotes: crypto_quotes(),
            })],
            Arc::clone(&store),
            Some(Arc::clone(&db) as Arc<dyn RatesRepository>),
        );

        pipeline.run(&[QuoteSource::Crypto]).await.unwrap();

        let persisted = db.load_quotes().unwrap();
        assert_eq!(persisted.len(), 2);

        // A fresh store warm starts from the persisted quotes.
        let restarted = RateStore::new();
        restarted.commit(persisted);
        assert_eq!(
            restarted.get(Currency::Btc).unwrap().price_usd,
            dec!(50000)
        );
    }
}
