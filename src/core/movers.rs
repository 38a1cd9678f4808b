//! Top and bottom movers of an equity basket by intraday change.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::quote::{HistoricalPeriod, QuoteProvider};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoverRecord {
    pub symbol: String,
    pub change_pct: f64,
    pub last_price: f64,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Movers {
    /// Highest changes first.
    pub gainers: Vec<MoverRecord>,
    /// Lowest changes first.
    pub losers: Vec<MoverRecord>,
}

/// Sorts by `change_pct` descending and slices both ends.
///
/// The sort is stable, so equal changes keep basket order. Gainers are
/// `sorted[..n]`; losers are `sorted[len - n..]` reported worst first. With
/// fewer than `2n` records the two lists overlap.
pub fn rank_records(mut records: Vec<MoverRecord>, n: usize) -> Movers {
    records.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));

    let gainers = records.iter().take(n).cloned().collect();
    let losers = records
        .iter()
        .skip(records.len().saturating_sub(n))
        .rev()
        .cloned()
        .collect();

    Movers { gainers, losers }
}

pub struct MoverRanker {
    historical: Arc<dyn QuoteProvider>,
    count: usize,
}

impl MoverRanker {
    pub fn new(historical: Arc<dyn QuoteProvider>, count: usize) -> Self {
        Self { historical, count }
    }

    /// Latest session of `symbol`, or `None` when it has no usable data.
    async fn record(&self, symbol: &str, window: HistoricalPeriod) -> Option<MoverRecord> {
        let series = match self.historical.fetch_series(symbol, window).await {
            Ok(series) => series,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Excluded from ranking");
                return None;
            }
        };
        let bar = series.last()?;
        let Some(change_pct) = bar.intraday_change_pct() else {
            debug!(symbol = %symbol, "Latest session has no usable open");
            return None;
        };

        Some(MoverRecord {
            symbol: symbol.to_string(),
            change_pct,
            last_price: bar.close,
            volume: bar.volume,
        })
    }

    #[instrument(name = "RankMovers", skip(self, symbols), fields(basket = symbols.len(), n = self.count))]
    pub async fn rank(&self, symbols: &[String], window: HistoricalPeriod) -> Movers {
        let records: Vec<MoverRecord> = join_all(symbols.iter().map(|s| self.record(s, window)))
            .await
            .into_iter()
            .flatten()
            .collect();
        debug!("{} of {} symbols ranked", records.len(), symbols.len());
        rank_records(records, self.count)
    }
}
