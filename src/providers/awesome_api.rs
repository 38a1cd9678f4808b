use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::util::HttpContext;
use crate::core::cache::{Cache, TtlPolicy};
use crate::core::error::{QuoteError, QuoteResult};
use crate::core::quote::{
    BatchQuoteProvider, BatchQuotes, CurrencyPair, HistoricalPeriod, PairQuote, PriceBar,
    PriceSeries, Quote, QuoteProvider,
};

/// Supplier backed by the AwesomeAPI economy endpoints.
///
/// `/json/last/{PAIRS}` quotes a comma-joined basket in one round trip;
/// `/json/daily/{PAIR}/{days}` returns recent daily bids, newest first.
pub struct AwesomeApiProvider {
    base_url: String,
    http: HttpContext,
    batch_cache: Arc<Cache<String, BatchQuotes>>,
    series_cache: Arc<Cache<String, PriceSeries>>,
    ttl: TtlPolicy,
}

impl AwesomeApiProvider {
    pub fn new(
        base_url: &str,
        http: HttpContext,
        batch_cache: Arc<Cache<String, BatchQuotes>>,
        series_cache: Arc<Cache<String, PriceSeries>>,
        ttl: TtlPolicy,
    ) -> Self {
        AwesomeApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            batch_cache,
            series_cache,
            ttl,
        }
    }

    async fn fetch_last(&self, pairs: &str) -> QuoteResult<BatchQuotes> {
        let key = format!("last:{pairs}");
        self.batch_cache
            .get_or_compute(key, self.ttl.live, || async {
                let url = format!("{}/json/last/{}", self.base_url, pairs);
                let data: HashMap<String, AwesomeQuote> = self.http.get_json(&url, pairs).await?;
                let quotes: BatchQuotes = data
                    .into_iter()
                    .map(|(code, quote)| (code.to_uppercase(), quote.into_pair_quote()))
                    .collect();
                debug!("Received {} pair quotes", quotes.len());
                Ok(quotes)
            })
            .await
    }
}

#[derive(Debug, Deserialize)]
struct AwesomeQuote {
    bid: Option<String>,
    #[serde(alias = "varBid")]
    var_bid: Option<String>,
    #[serde(alias = "pctChange")]
    pct_change: Option<String>,
    timestamp: Option<String>,
}

impl AwesomeQuote {
    fn into_pair_quote(self) -> PairQuote {
        PairQuote {
            bid: parse_decimal(self.bid.as_deref()),
            // pctChange is already a percentage; varBid is what older payloads carry
            variation: parse_decimal(self.pct_change.as_deref())
                .or_else(|| parse_decimal(self.var_bid.as_deref())),
        }
    }
}

/// Parses a string-encoded decimal. Empty, malformed and non-finite values are absent.
fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Accepts `USD-BRL` or `USDBRL` and returns the dashed form the API expects.
fn normalize_pair(ticker: &str) -> String {
    let ticker = ticker.trim().to_uppercase();
    if ticker.contains('-') || ticker.len() != 6 || !ticker.is_ascii() {
        ticker
    } else {
        format!("{}-{}", &ticker[..3], &ticker[3..])
    }
}

#[async_trait]
impl BatchQuoteProvider for AwesomeApiProvider {
    #[instrument(name = "AwesomeBatchFetch", skip(self, pairs), fields(pairs = pairs.len()))]
    async fn fetch_batch(&self, pairs: &[CurrencyPair]) -> QuoteResult<BatchQuotes> {
        if pairs.is_empty() {
            return Ok(BatchQuotes::new());
        }
        let joined = pairs
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.fetch_last(&joined).await
    }
}

#[async_trait]
impl QuoteProvider for AwesomeApiProvider {
    #[instrument(name = "AwesomeLastPrice", skip(self), fields(ticker = %ticker))]
    async fn fetch_last_price(&self, ticker: &str) -> QuoteResult<Quote> {
        let pair = normalize_pair(ticker);
        let quotes = self.fetch_last(&pair).await?;
        let price = quotes
            .get(&pair.replace('-', ""))
            .and_then(|q| q.bid)
            .ok_or_else(|| QuoteError::NoData(pair.clone()))?;

        Ok(Quote {
            symbol: pair,
            price,
            as_of: Utc::now(),
        })
    }

    #[instrument(name = "AwesomeSeriesFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_series(
        &self,
        ticker: &str,
        lookback: HistoricalPeriod,
    ) -> QuoteResult<PriceSeries> {
        let pair = normalize_pair(ticker);
        let key = format!("{pair}:{lookback}");
        self.series_cache
            .get_or_compute(key, self.ttl.historical, || async {
                let url = format!("{}/json/daily/{}/{}", self.base_url, pair, lookback.days());
                let data: Vec<AwesomeQuote> = self.http.get_json(&url, &pair).await?;

                let bars: Vec<PriceBar> = data
                    .into_iter()
                    .filter_map(|q| {
                        let close = parse_decimal(q.bid.as_deref())?;
                        let ts = q.timestamp.as_deref()?.trim().parse::<i64>().ok()?;
                        let date = Utc.timestamp_opt(ts, 0).single()?.date_naive();
                        Some(PriceBar {
                            date,
                            open: None,
                            close,
                            volume: None,
                        })
                    })
                    .collect();

                if bars.is_empty() {
                    return Err(QuoteError::NoData(pair.clone()));
                }
                Ok(PriceSeries::new(bars))
            })
            .await
    }
}
