//! User-facing rendering for CLI commands.

pub mod portfolio;
pub mod rates;
pub mod trade;
pub mod ui;
