//! One refresh cycle: rates, movers and indices gathered concurrently.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::cache::{Cache, TtlPolicy};
use super::config::{AppConfig, IndexEntry};
use super::movers::{MoverRanker, Movers};
use super::quote::{BatchQuotes, HistoricalPeriod, PriceBar, PriceSeries, QuoteProvider};
use super::rates::{RateResolver, RateResult, ResolverSettings};
use crate::providers::awesome_api::AwesomeApiProvider;
use crate::providers::util::HttpContext;
use crate::providers::yahoo_finance::YahooFinanceProvider;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub symbol: String,
    pub last: Option<f64>,
    pub change_pct: Option<f64>,
    pub series: Vec<(NaiveDate, f64)>,
}

impl IndexSnapshot {
    fn unavailable(entry: &IndexEntry) -> Self {
        Self {
            name: entry.name.clone(),
            symbol: entry.symbol.clone(),
            last: None,
            change_pct: None,
            series: Vec::new(),
        }
    }
}

/// Display-ready result of one refresh. Rates and indices keep basket order.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub rates: Vec<RateResult>,
    pub movers: Movers,
    pub indices: Vec<IndexSnapshot>,
    pub refreshed_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn rate(&self, code: &str) -> Option<&RateResult> {
        self.rates.iter().find(|r| r.symbol.eq_ignore_ascii_case(code))
    }

    pub fn index(&self, name: &str) -> Option<&IndexSnapshot> {
        self.indices.iter().find(|i| i.name == name)
    }
}

/// Caches shared by the suppliers for the lifetime of the process.
#[derive(Clone, Default)]
pub struct Caches {
    pub batch: Arc<Cache<String, BatchQuotes>>,
    pub series: Arc<Cache<String, PriceSeries>>,
}

impl Caches {
    pub async fn purge_expired(&self) {
        self.batch.purge_expired().await;
        self.series.purge_expired().await;
    }
}

/// What a refresh cycle fetches and how long it may take.
#[derive(Debug, Clone)]
pub struct RefreshPlan {
    pub currencies: Vec<String>,
    pub equities: Vec<String>,
    pub indices: Vec<IndexEntry>,
    pub deadline: Duration,
}

pub struct Orchestrator {
    resolver: Arc<RateResolver>,
    ranker: Arc<MoverRanker>,
    historical: Arc<dyn QuoteProvider>,
    caches: Caches,
    plan: RefreshPlan,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<RateResolver>,
        ranker: Arc<MoverRanker>,
        historical: Arc<dyn QuoteProvider>,
        caches: Caches,
        plan: RefreshPlan,
    ) -> Self {
        Self {
            resolver,
            ranker,
            historical,
            caches,
            plan,
        }
    }

    /// Wires the suppliers, caches, resolver and ranker described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = HttpContext::new(config.request_timeout(), config.http.max_concurrent_requests)?;
        let caches = Caches::default();
        let ttl = TtlPolicy {
            live: config.primary_ttl(),
            historical: config.historical_ttl(),
        };

        let primary = Arc::new(AwesomeApiProvider::new(
            config.awesome_base_url(),
            http.clone(),
            Arc::clone(&caches.batch),
            Arc::clone(&caches.series),
            ttl,
        ));
        let historical: Arc<dyn QuoteProvider> = Arc::new(YahooFinanceProvider::new(
            config.yahoo_base_url(),
            http,
            Arc::clone(&caches.series),
            ttl.historical,
        ));

        let currencies: Vec<String> = config
            .currencies
            .iter()
            .map(|c| c.code.trim().to_uppercase())
            .collect();
        let resolver = RateResolver::new(
            primary,
            Arc::clone(&historical),
            ResolverSettings {
                quote: config.quote_currency.trim().to_uppercase(),
                pivot: config.pivot_currency.trim().to_uppercase(),
                ticker_suffix: config.fx_ticker_suffix.clone(),
                basket: currencies.clone(),
            },
        );
        let ranker = MoverRanker::new(Arc::clone(&historical), config.movers);

        Ok(Self::new(
            Arc::new(resolver),
            Arc::new(ranker),
            historical,
            caches,
            RefreshPlan {
                currencies,
                equities: config.equities.clone(),
                indices: config.indices.clone(),
                deadline: config.refresh_timeout(),
            },
        ))
    }

    /// Runs one refresh cycle. Never fails: anything that could not be
    /// fetched in time is reported as absent.
    ///
    /// Work runs on detached tasks, so dropping this future or hitting the
    /// deadline leaves in-flight fetches running to populate the cache.
    #[instrument(name = "RefreshAll", skip(self))]
    pub async fn refresh_all(&self) -> Snapshot {
        let deadline = Instant::now() + self.plan.deadline;

        let rate_tasks: Vec<JoinHandle<RateResult>> = self
            .plan
            .currencies
            .iter()
            .map(|code| {
                let resolver = Arc::clone(&self.resolver);
                let code = code.clone();
                tokio::spawn(async move { resolver.resolve(&code).await })
            })
            .collect();

        let movers_task = {
            let ranker = Arc::clone(&self.ranker);
            let equities = self.plan.equities.clone();
            tokio::spawn(async move { ranker.rank(&equities, HistoricalPeriod::FiveDays).await })
        };

        let index_tasks: Vec<JoinHandle<IndexSnapshot>> = self
            .plan
            .indices
            .iter()
            .map(|entry| {
                let historical = Arc::clone(&self.historical);
                let entry = entry.clone();
                tokio::spawn(async move { index_snapshot(historical.as_ref(), &entry).await })
            })
            .collect();

        let mut rates = Vec::with_capacity(rate_tasks.len());
        for (task, code) in rate_tasks.into_iter().zip(&self.plan.currencies) {
            let rate = join_by(deadline, task, code)
                .await
                .unwrap_or_else(|| RateResult::unavailable(&code.to_uppercase()));
            rates.push(rate);
        }

        let movers = join_by(deadline, movers_task, "movers")
            .await
            .unwrap_or_default();

        let mut indices = Vec::with_capacity(index_tasks.len());
        for (task, entry) in index_tasks.into_iter().zip(&self.plan.indices) {
            let index = join_by(deadline, task, &entry.name)
                .await
                .unwrap_or_else(|| IndexSnapshot::unavailable(entry));
            indices.push(index);
        }

        self.caches.purge_expired().await;

        info!(
            rates = rates.iter().filter(|r| r.value.is_some()).count(),
            of = rates.len(),
            gainers = movers.gainers.len(),
            indices = indices.iter().filter(|i| i.last.is_some()).count(),
            "Refresh complete"
        );

        Snapshot {
            rates,
            movers,
            indices,
            refreshed_at: Utc::now(),
        }
    }
}

/// Waits for `task` until `deadline`. A late task is left running detached.
async fn join_by<T>(deadline: Instant, task: JoinHandle<T>, label: &str) -> Option<T> {
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(task = %label, error = %e, "Refresh task failed");
            None
        }
        Err(_) => {
            warn!(task = %label, "Refresh task missed the deadline");
            None
        }
    }
}

async fn index_snapshot(historical: &dyn QuoteProvider, entry: &IndexEntry) -> IndexSnapshot {
    match historical
        .fetch_series(&entry.symbol, HistoricalPeriod::OneMonth)
        .await
    {
        Ok(series) => IndexSnapshot {
            name: entry.name.clone(),
            symbol: entry.symbol.clone(),
            last: series.last_close(),
            change_pct: series.last().and_then(PriceBar::intraday_change_pct),
            series: series.closes(),
        },
        Err(e) => {
            warn!(index = %entry.name, error = %e, "Index unavailable");
            IndexSnapshot::unavailable(entry)
        }
    }
}
