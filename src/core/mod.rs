//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod movers;
pub mod orchestrator;
pub mod quote;
pub mod rates;

// Re-export main types for cleaner imports
pub use error::{QuoteError, QuoteResult};
pub use movers::{MoverRanker, MoverRecord, Movers};
pub use orchestrator::{Orchestrator, Snapshot};
pub use quote::{BatchQuoteProvider, HistoricalPeriod, PriceSeries, QuoteProvider};
pub use rates::{RateResolver, RateResult, RateSource};
