use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::util::HttpContext;
use crate::core::cache::Cache;
use crate::core::error::{QuoteError, QuoteResult};
use crate::core::quote::{HistoricalPeriod, PriceBar, PriceSeries, Quote, QuoteProvider};

fn value_at<T: Copy>(values: Option<&Vec<Option<T>>>, index: usize) -> Option<T> {
    values.and_then(|v| v.get(index).copied().flatten())
}

/// Turns a chart item into daily bars, skipping sessions without a close.
fn extract_bars(chart_item: &PriceChartItem) -> Vec<PriceBar> {
    let (Some(timestamps), Some(quote)) = (
        chart_item.timestamp.as_ref(),
        chart_item
            .indicators
            .as_ref()
            .and_then(|inds| inds.quote.first()),
    ) else {
        return Vec::new();
    };

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = value_at(quote.close.as_ref(), i).filter(|c| c.is_finite())?;
            let date = Utc.timestamp_opt(*ts, 0).single()?.date_naive();
            Some(PriceBar {
                date,
                open: value_at(quote.open.as_ref(), i).filter(|o| o.is_finite()),
                close,
                volume: value_at(quote.volume.as_ref(), i),
            })
        })
        .collect()
}

/// Historical supplier backed by the Yahoo Finance chart API.
pub struct YahooFinanceProvider {
    base_url: String,
    http: HttpContext,
    cache: Arc<Cache<String, PriceSeries>>,
    ttl: Duration,
}

impl YahooFinanceProvider {
    pub fn new(
        base_url: &str,
        http: HttpContext,
        cache: Arc<Cache<String, PriceSeries>>,
        ttl: Duration,
    ) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
            ttl,
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    #[instrument(name = "YahooLastPrice", skip(self), fields(ticker = %ticker))]
    async fn fetch_last_price(&self, ticker: &str) -> QuoteResult<Quote> {
        let series = self.fetch_series(ticker, HistoricalPeriod::FiveDays).await?;
        let bar = series
            .last()
            .ok_or_else(|| QuoteError::NoData(ticker.to_string()))?;
        let as_of = bar
            .date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            symbol: ticker.to_string(),
            price: bar.close,
            as_of,
        })
    }

    #[instrument(name = "YahooSeriesFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_series(
        &self,
        ticker: &str,
        lookback: HistoricalPeriod,
    ) -> QuoteResult<PriceSeries> {
        let key = format!("{ticker}:{lookback}");
        self.cache
            .get_or_compute(key, self.ttl, || async {
                let url = format!(
                    "{}/v8/finance/chart/{}?interval=1d&range={}",
                    self.base_url, ticker, lookback
                );
                let data: YahooPriceResponse = self.http.get_json(&url, ticker).await?;

                let item = data
                    .chart
                    .result
                    .and_then(|items| items.into_iter().next())
                    .ok_or_else(|| QuoteError::NoData(ticker.to_string()))?;

                let bars = extract_bars(&item);
                debug!("Received {} daily bars", bars.len());
                if bars.is_empty() {
                    return Err(QuoteError::NoData(ticker.to_string()));
                }
                Ok(PriceSeries::new(bars))
            })
            .await
    }
}
