//! Quote abstractions and core types

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt::Display;

use super::error::QuoteResult;

/// Lookback window for a daily price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoricalPeriod {
    FiveDays,
    OneMonth,
}

impl Display for HistoricalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                HistoricalPeriod::FiveDays => "5d",
                HistoricalPeriod::OneMonth => "1mo",
            }
        )
    }
}

impl HistoricalPeriod {
    pub fn days(&self) -> u32 {
        match self {
            HistoricalPeriod::FiveDays => 5,
            HistoricalPeriod::OneMonth => 30,
        }
    }
}

/// A single current price produced by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub as_of: DateTime<Utc>,
}

/// One daily session. `open` and `volume` are absent for suppliers that only
/// report closes.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

impl PriceBar {
    /// Intraday change of this session in percent, `(close - open) / open * 100`.
    pub fn intraday_change_pct(&self) -> Option<f64> {
        match self.open {
            Some(open) if open != 0.0 => Some((self.close - open) / open * 100.0),
            _ => None,
        }
    }
}

/// Chronological daily series with at most one bar per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Builds a series from bars in any order. Later duplicates of a date win.
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.reverse();
        // stable sort keeps the reversed order among equal dates, so dedup
        // retains the bar that came last in the input
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Self { bars }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }

    pub fn previous_close(&self) -> Option<f64> {
        self.bars.len().checked_sub(2).map(|i| self.bars[i].close)
    }

    /// Percentage change between the last two closes. Absent with fewer than
    /// two bars or a zero prior close.
    pub fn change_pct(&self) -> Option<f64> {
        let last = self.last_close()?;
        let previous = self.previous_close()?;
        if previous == 0.0 {
            return None;
        }
        Some((last - previous) / previous * 100.0)
    }

    pub fn closes(&self) -> Vec<(NaiveDate, f64)> {
        self.bars.iter().map(|bar| (bar.date, bar.close)).collect()
    }
}

/// A currency pair as quoted by the primary supplier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    /// Key used in batch responses, e.g. `USDBRL`.
    pub fn code(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Bid and reported variation of a pair from a batch response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairQuote {
    pub bid: Option<f64>,
    pub variation: Option<f64>,
}

/// Batch quotes keyed by [`CurrencyPair::code`].
pub type BatchQuotes = HashMap<String, PairQuote>;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_last_price(&self, ticker: &str) -> QuoteResult<Quote>;

    async fn fetch_series(&self, ticker: &str, lookback: HistoricalPeriod)
    -> QuoteResult<PriceSeries>;
}

/// A supplier that quotes a whole basket of pairs in one round trip.
#[async_trait]
pub trait BatchQuoteProvider: Send + Sync {
    async fn fetch_batch(&self, pairs: &[CurrencyPair]) -> QuoteResult<BatchQuotes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: None,
            close,
            volume: None,
        }
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = PriceSeries::new(vec![bar(3, 12.0), bar(1, 10.0), bar(2, 11.0), bar(3, 13.0)]);

        let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 13.0]);
        assert_eq!(series.last_close(), Some(13.0));
        assert_eq!(series.previous_close(), Some(11.0));
    }

    #[test]
    fn test_change_pct_needs_two_points() {
        assert_eq!(PriceSeries::default().change_pct(), None);
        assert_eq!(PriceSeries::new(vec![bar(1, 10.0)]).change_pct(), None);

        let flat = PriceSeries::new(vec![bar(1, 10.0), bar(2, 10.0)]);
        assert_eq!(flat.change_pct(), Some(0.0));

        let up = PriceSeries::new(vec![bar(1, 10.0), bar(2, 11.0)]);
        assert!((up.change_pct().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_change_pct_zero_previous_close() {
        let series = PriceSeries::new(vec![bar(1, 0.0), bar(2, 11.0)]);
        assert_eq!(series.change_pct(), None);
    }

    #[test]
    fn test_intraday_change() {
        let mut b = bar(1, 103.0);
        assert_eq!(b.intraday_change_pct(), None);
        b.open = Some(100.0);
        assert!((b.intraday_change_pct().unwrap() - 3.0).abs() < 1e-9);
        b.open = Some(0.0);
        assert_eq!(b.intraday_change_pct(), None);
    }

    #[test]
    fn test_historical_period_format() {
        assert_eq!(HistoricalPeriod::FiveDays.to_string(), "5d");
        assert_eq!(HistoricalPeriod::OneMonth.to_string(), "1mo");
        assert_eq!(HistoricalPeriod::FiveDays.days(), 5);
        assert_eq!(HistoricalPeriod::OneMonth.days(), 30);
    }

    #[test]
    fn test_currency_pair_formats() {
        let pair = CurrencyPair::new("usd", "brl");
        assert_eq!(pair.code(), "USDBRL");
        assert_eq!(pair.to_string(), "USD-BRL");
    }
}
