//! Quote and rate error types.

use thiserror::Error;

/// Failures that can occur while fetching or deriving a quote.
///
/// None of these reach the presentation layer; the resolver, ranker and
/// orchestrator turn them into absent fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    /// Network error, timeout, non-success status or unreadable payload.
    #[error("Provider unavailable for {symbol}: {reason}")]
    ProviderUnavailable { symbol: String, reason: String },

    /// The provider answered, but nothing usable remained after cleaning.
    #[error("No data for {0}")]
    NoData(String),

    /// A cross-rate denominator resolved to zero.
    #[error("Division by zero while deriving {0}")]
    DivisionByZero(String),
}

impl QuoteError {
    pub fn unavailable(symbol: &str, reason: impl ToString) -> Self {
        QuoteError::ProviderUnavailable {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for quote operations.
pub type QuoteResult<T> = Result<T, QuoteError>;
