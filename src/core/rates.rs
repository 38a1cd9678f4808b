//! Exchange-rate resolution against a fixed quote currency.
//!
//! A currency's value is looked up directly (batch supplier first, then the
//! historical supplier's last close for the direct pair) and, failing that,
//! derived through the pivot currency. Its percentage change is resolved
//! independently: direct series, then cross series, then the batch
//! supplier's reported variation.

use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::error::{QuoteError, QuoteResult};
use super::quote::{BatchQuoteProvider, CurrencyPair, HistoricalPeriod, PairQuote, PriceSeries, QuoteProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RateSource {
    /// Quoted directly for the pair, by either supplier.
    Primary,
    /// Derived from two pivot legs.
    Cross,
    Unavailable,
}

impl Display for RateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RateSource::Primary => "direct",
                RateSource::Cross => "cross",
                RateSource::Unavailable => "unavailable",
            }
        )
    }
}

/// Resolved value of one currency in the quote currency.
///
/// `value` and `change_pct` are independent: either may be absent while the
/// other is present. A flat market is `Some(0.0)`, never `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateResult {
    pub symbol: String,
    pub value: Option<f64>,
    pub change_pct: Option<f64>,
    pub source: RateSource,
}

impl RateResult {
    pub fn unavailable(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            value: None,
            change_pct: None,
            source: RateSource::Unavailable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub quote: String,
    pub pivot: String,
    /// Appended to `{BASE}{QUOTE}` to form a historical-supplier ticker.
    pub ticker_suffix: String,
    /// Currencies requested together from the batch supplier.
    pub basket: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            quote: "BRL".to_string(),
            pivot: "USD".to_string(),
            ticker_suffix: "=X".to_string(),
            basket: Vec::new(),
        }
    }
}

/// `pivot/currency ÷ pivot/quote`. A zero denominator is an error, not infinity.
pub fn cross_rate(pivot_currency: f64, pivot_quote: f64) -> QuoteResult<f64> {
    if pivot_quote == 0.0 {
        return Err(QuoteError::DivisionByZero(format!(
            "{pivot_currency} / {pivot_quote}"
        )));
    }
    Ok(pivot_currency / pivot_quote)
}

/// First-order change of a ratio of two series: `pct(a) - pct(b)`.
pub fn cross_change_pct(pivot_currency: &PriceSeries, pivot_quote: &PriceSeries) -> Option<f64> {
    Some(pivot_currency.change_pct()? - pivot_quote.change_pct()?)
}

/// Series for the two pivot legs of a cross rate.
struct CrossLegs {
    pivot_currency: QuoteResult<PriceSeries>,
    pivot_quote: QuoteResult<PriceSeries>,
}

impl CrossLegs {
    fn value(&self) -> QuoteResult<f64> {
        let a = last_close(&self.pivot_currency)?;
        let b = last_close(&self.pivot_quote)?;
        cross_rate(a, b)
    }

    fn change_pct(&self) -> Option<f64> {
        match (&self.pivot_currency, &self.pivot_quote) {
            (Ok(a), Ok(b)) => cross_change_pct(a, b),
            _ => None,
        }
    }
}

fn last_close(series: &QuoteResult<PriceSeries>) -> QuoteResult<f64> {
    match series {
        Ok(s) => s.last_close().ok_or_else(|| QuoteError::NoData("empty series".to_string())),
        Err(e) => Err(e.clone()),
    }
}

pub struct RateResolver {
    primary: Arc<dyn BatchQuoteProvider>,
    historical: Arc<dyn QuoteProvider>,
    settings: ResolverSettings,
}

impl RateResolver {
    pub fn new(
        primary: Arc<dyn BatchQuoteProvider>,
        historical: Arc<dyn QuoteProvider>,
        settings: ResolverSettings,
    ) -> Self {
        let settings = ResolverSettings {
            quote: settings.quote.to_uppercase(),
            pivot: settings.pivot.to_uppercase(),
            basket: settings.basket.iter().map(|c| c.to_uppercase()).collect(),
            ..settings
        };
        Self {
            primary,
            historical,
            settings,
        }
    }

    fn ticker(&self, base: &str, quote: &str) -> String {
        format!("{}{}{}", base, quote, self.settings.ticker_suffix)
    }

    /// Pairs for the configured basket plus `code`, so the batch request (and
    /// its cache key) is the same for every currency in the basket.
    fn batch_pairs(&self, code: &str) -> Vec<CurrencyPair> {
        let mut codes: Vec<&str> = self.settings.basket.iter().map(String::as_str).collect();
        if !codes.contains(&code) {
            codes.push(code);
        }
        codes
            .into_iter()
            .filter(|c| *c != self.settings.quote)
            .map(|c| CurrencyPair::new(c, &self.settings.quote))
            .collect()
    }

    async fn primary_quote(&self, code: &str) -> Option<PairQuote> {
        let pair = CurrencyPair::new(code, &self.settings.quote);
        match self.primary.fetch_batch(&self.batch_pairs(code)).await {
            Ok(quotes) => quotes.get(&pair.code()).cloned(),
            Err(e) => {
                warn!(error = %e, "Primary supplier failed");
                None
            }
        }
    }

    async fn series(&self, ticker: &str) -> QuoteResult<PriceSeries> {
        self.historical
            .fetch_series(ticker, HistoricalPeriod::FiveDays)
            .await
    }

    async fn cross_legs(&self, code: &str) -> CrossLegs {
        let pivot = &self.settings.pivot;
        let currency_ticker = self.ticker(pivot, code);
        let quote_ticker = self.ticker(pivot, &self.settings.quote);
        let (pivot_currency, pivot_quote) =
            tokio::join!(self.series(&currency_ticker), self.series(&quote_ticker));
        CrossLegs {
            pivot_currency,
            pivot_quote,
        }
    }

    /// Resolves `code` against the quote currency. Never fails; anything that
    /// cannot be resolved is reported as absent.
    #[instrument(name = "ResolveRate", skip(self), fields(quote = %self.settings.quote))]
    pub async fn resolve(&self, code: &str) -> RateResult {
        let code = code.trim().to_uppercase();
        let quote = &self.settings.quote;

        if code == *quote {
            return RateResult {
                symbol: code,
                value: Some(1.0),
                change_pct: Some(0.0),
                source: RateSource::Primary,
            };
        }

        let direct_ticker = self.ticker(&code, quote);
        let (primary, direct) =
            tokio::join!(self.primary_quote(&code), self.series(&direct_ticker));
        if let Err(e) = &direct {
            debug!(error = %e, "No direct series");
        }
        let direct = direct.ok();

        let mut value = primary.as_ref().and_then(|p| p.bid);
        let mut source = RateSource::Primary;
        if value.is_none() {
            value = direct.as_ref().and_then(PriceSeries::last_close);
        }
        let mut change_pct = direct.as_ref().and_then(PriceSeries::change_pct);

        // the pivot itself only has the direct pivot/quote pair
        let is_pivot = code == self.settings.pivot;
        if !is_pivot && (value.is_none() || change_pct.is_none()) {
            let legs = self.cross_legs(&code).await;
            if value.is_none() {
                match legs.value() {
                    Ok(v) => {
                        value = Some(v);
                        source = RateSource::Cross;
                    }
                    Err(e) => debug!(error = %e, "Cross rate unavailable"),
                }
            }
            if change_pct.is_none() {
                change_pct = legs.change_pct();
            }
        }

        if change_pct.is_none() {
            change_pct = primary.as_ref().and_then(|p| p.variation);
        }

        if value.is_none() {
            warn!(currency = %code, "Rate unavailable");
            source = RateSource::Unavailable;
        }
        if change_pct.is_none() {
            debug!(currency = %code, "Change unavailable");
        }

        RateResult {
            symbol: code,
            value,
            change_pct,
            source,
        }
    }
}
