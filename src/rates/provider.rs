//! Provides the quote feed boundary for the update pipeline.

use async_trait::async_trait;

use crate::error::Result;
use crate::rates::{Quote, QuoteSource};

/// An external quote feed. Each implementation is opaque and may fail
/// independently of the others; the pipeline treats a failure from one
/// source as unrelated to the rest.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn source(&self) -> QuoteSource;

    /// Human readable name for logs and error reporting.
    fn display_name(&self) -> &'static str;

    /// Fetches the current batch of quotes priced in USD.
    async fn fetch(&self) -> Result<Vec<Quote>>;
}
