//! Orchestrates series assembly, solving, aggregation, and the cache.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use log::{debug, error, warn};
use rust_decimal::Decimal;
use tokio::sync::{watch, Semaphore};

use crate::aggregation::{
    aggregate_dashboard, aggregate_portfolio, DashboardSummary, FundIrr, PortfolioAggregate,
    RateOutcome,
};
use crate::cache::{
    CacheKey, CacheLookup, CacheStore, CachedValue, ComputeGuard, ComputeOutcome, ComputeRole,
    Freshness,
};
use crate::cashflow::{EntityKind, PerformanceSourceTrait, SeriesBuilder};
use crate::config::PerformanceConfig;
use crate::errors::{Error, Result};
use crate::events::DomainEvent;
use crate::solver;

use super::PerformanceEngineTrait;

/// The performance-calculation and caching engine.
///
/// Explicitly constructed and injectable; independent instances share
/// nothing, so tests can build as many as they need.
#[derive(Clone)]
pub struct PerformanceEngine {
    source: Arc<dyn PerformanceSourceTrait>,
    builder: SeriesBuilder,
    store: CacheStore,
    /// Bounds concurrent leaf recomputations so a burst of cache misses
    /// cannot launch unbounded work.
    recompute_permits: Arc<Semaphore>,
}

impl PerformanceEngine {
    pub fn new(source: Arc<dyn PerformanceSourceTrait>, config: PerformanceConfig) -> Self {
        let permits = config.max_concurrent_recomputations.max(1);
        Self {
            builder: SeriesBuilder::new(Arc::clone(&source)),
            store: CacheStore::new(config),
            source,
            recompute_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Read access to the cache, for diagnostics and tests.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Serves the key from cache, recomputing through the single-flight
    /// guard when needed. Boxed because portfolio and dashboard
    /// recomputations read their constituents through this same path.
    fn read_through(&self, key: CacheKey) -> BoxFuture<'static, Result<(CachedValue, Freshness)>> {
        let engine = self.clone();
        async move {
            match engine.store.lookup(&key) {
                CacheLookup::Fresh(value) => Ok((value, Freshness::Fresh)),
                CacheLookup::Stale(Some(value)) => {
                    debug!("Serving {key} stale while revalidating");
                    engine.spawn_revalidation(key);
                    Ok((value, Freshness::Stale))
                }
                CacheLookup::Stale(None) | CacheLookup::Empty => {
                    engine.compute_or_join(&key).await
                }
            }
        }
        .boxed()
    }

    /// Like [`read_through`](Self::read_through) but never serves a stale
    /// value: roll-ups read their constituents through this path so a
    /// freshly published aggregate is never derived from superseded fund
    /// results.
    fn read_fresh(&self, key: CacheKey) -> BoxFuture<'static, Result<(CachedValue, Freshness)>> {
        let engine = self.clone();
        async move {
            if let CacheLookup::Fresh(value) = engine.store.lookup(&key) {
                return Ok((value, Freshness::Fresh));
            }
            engine.compute_or_join(&key).await
        }
        .boxed()
    }

    async fn compute_or_join(&self, key: &CacheKey) -> Result<(CachedValue, Freshness)> {
        match self.store.begin_compute(key) {
            ComputeRole::Leader(guard) => self.lead_compute(key, guard).await,
            ComputeRole::Joiner(rx) => join_outcome(rx).await,
        }
    }

    async fn lead_compute(
        &self,
        key: &CacheKey,
        guard: ComputeGuard,
    ) -> Result<(CachedValue, Freshness)> {
        match self.compute(key).await {
            Ok(value) => {
                let freshness = guard.publish(value.clone());
                Ok((value, freshness))
            }
            Err(error) => {
                error!("Computation of {key} failed: {error}");
                guard.fail(error.to_string());
                Err(error)
            }
        }
    }

    /// Revalidates the key off the reader's path. Joining instead of
    /// leading means a revalidation is already in flight and there is
    /// nothing to do.
    fn spawn_revalidation(&self, key: CacheKey) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let ComputeRole::Leader(guard) = engine.store.begin_compute(&key) {
                match engine.compute(&key).await {
                    Ok(value) => {
                        guard.publish(value);
                    }
                    Err(error) => {
                        warn!(
                            "Revalidation of {key} failed, readers keep the last good value: {error}"
                        );
                        guard.fail(error.to_string());
                    }
                }
            }
        });
    }

    async fn compute(&self, key: &CacheKey) -> Result<CachedValue> {
        match key {
            CacheKey::Fund(fund_id) => Ok(CachedValue::Fund(self.compute_fund(fund_id).await?)),
            CacheKey::Portfolio(portfolio_id) => Ok(CachedValue::Portfolio(
                self.compute_portfolio(portfolio_id).await?,
            )),
            CacheKey::Dashboard => Ok(CachedValue::Dashboard(self.compute_dashboard().await?)),
        }
    }

    /// Leaf computation; the only place a worker-pool permit is held.
    /// Roll-ups stay outside the pool so nested recomputations cannot
    /// exhaust it against themselves.
    async fn compute_fund(&self, fund_id: &str) -> Result<FundIrr> {
        let _permit = self
            .recompute_permits
            .acquire()
            .await
            .map_err(|_| Error::Computation("recompute pool closed".to_string()))?;

        match self.builder.build(fund_id, EntityKind::Fund).await {
            Ok(series) => {
                let input_fingerprint = series.fingerprint();
                let rate = match solver::solve(&series) {
                    Ok(rate) => RateOutcome::Rate(rate),
                    Err(Error::Unsolvable) => RateOutcome::Unsolvable,
                    Err(error) => return Err(error),
                };
                Ok(FundIrr {
                    entity_id: fund_id.to_string(),
                    entity_kind: EntityKind::Fund,
                    rate,
                    computed_at: Utc::now(),
                    input_fingerprint,
                })
            }
            Err(Error::NoData(_)) | Err(Error::IncompleteData(_)) => Ok(FundIrr {
                entity_id: fund_id.to_string(),
                entity_kind: EntityKind::Fund,
                rate: RateOutcome::InsufficientData,
                computed_at: Utc::now(),
                input_fingerprint: String::new(),
            }),
            Err(error) => Err(error),
        }
    }

    async fn compute_portfolio(&self, portfolio_id: &str) -> Result<PortfolioAggregate> {
        let fund_ids = self
            .source
            .list_active_funds_for_portfolio(portfolio_id)
            .await?;

        let constituents = try_join_all(fund_ids.iter().map(|fund_id| {
            let engine = self.clone();
            let fund_id = fund_id.clone();
            async move {
                let (value, _) = engine.read_fresh(CacheKey::Fund(fund_id.clone())).await?;
                let fund = value
                    .into_fund()
                    .ok_or_else(|| Error::Computation(format!("fund result expected for '{fund_id}'")))?;
                let valuation = engine.latest_valuation_amount(&fund_id).await?;
                Ok::<_, Error>((fund, valuation))
            }
        }))
        .await?;

        // Remember the constituents so invalidating any of these funds
        // cascades to this portfolio.
        self.store
            .record_portfolio_membership(portfolio_id, &fund_ids);

        Ok(aggregate_portfolio(portfolio_id, constituents))
    }

    async fn compute_dashboard(&self) -> Result<DashboardSummary> {
        let portfolio_ids = self.source.list_active_portfolios().await?;

        let aggregates = try_join_all(portfolio_ids.iter().map(|portfolio_id| {
            let engine = self.clone();
            let portfolio_id = portfolio_id.clone();
            async move {
                let (value, _) = engine
                    .read_fresh(CacheKey::Portfolio(portfolio_id.clone()))
                    .await?;
                value.into_portfolio().ok_or_else(|| {
                    Error::Computation(format!("portfolio result expected for '{portfolio_id}'"))
                })
            }
        }))
        .await?;

        let distinct_funds: HashSet<&str> = aggregates
            .iter()
            .flat_map(|aggregate| aggregate.fund_irrs.iter().map(|fund| fund.entity_id.as_str()))
            .collect();

        Ok(aggregate_dashboard(&aggregates, distinct_funds.len()))
    }

    async fn latest_valuation_amount(&self, fund_id: &str) -> Result<Option<Decimal>> {
        let valuations = self.source.list_valuations(fund_id).await?;
        Ok(valuations
            .into_iter()
            .max_by_key(|valuation| valuation.as_of_date)
            .map(|valuation| valuation.amount))
    }
}

#[async_trait]
impl PerformanceEngineTrait for PerformanceEngine {
    async fn get_fund_irr(&self, fund_id: &str) -> Result<(FundIrr, Freshness)> {
        let (value, freshness) = self
            .read_through(CacheKey::Fund(fund_id.to_string()))
            .await?;
        let fund = value
            .into_fund()
            .ok_or_else(|| Error::Computation(format!("fund result expected for '{fund_id}'")))?;
        Ok((fund, freshness))
    }

    async fn get_portfolio_irr(
        &self,
        portfolio_id: &str,
    ) -> Result<(PortfolioAggregate, Freshness)> {
        let (value, freshness) = self
            .read_through(CacheKey::Portfolio(portfolio_id.to_string()))
            .await?;
        let aggregate = value.into_portfolio().ok_or_else(|| {
            Error::Computation(format!("portfolio result expected for '{portfolio_id}'"))
        })?;
        Ok((aggregate, freshness))
    }

    async fn get_dashboard_summary(&self) -> Result<(DashboardSummary, Freshness)> {
        let (value, freshness) = self.read_through(CacheKey::Dashboard).await?;
        let summary = value
            .into_dashboard()
            .ok_or_else(|| Error::Computation("dashboard result expected".to_string()))?;
        Ok((summary, freshness))
    }

    fn invalidate(&self, entity_id: &str, entity_kind: EntityKind) {
        self.store.invalidate(entity_id, entity_kind);
    }

    fn apply_event(&self, event: &DomainEvent) {
        let (entity_id, entity_kind) = event.entity();
        self.store.invalidate(entity_id, entity_kind);
    }
}

async fn join_outcome(
    mut rx: watch::Receiver<Option<ComputeOutcome>>,
) -> Result<(CachedValue, Freshness)> {
    let outcome = rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| Error::Computation("in-flight computation vanished".to_string()))?
        .clone();
    match outcome {
        Some(ComputeOutcome::Published(value, freshness)) => Ok((value, freshness)),
        Some(ComputeOutcome::Failed(message)) => Err(Error::Computation(message)),
        None => Err(Error::Computation("in-flight computation vanished".to_string())),
    }
}
