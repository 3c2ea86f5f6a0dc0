//! Keyed storage of computed results with single-flight recomputation.
//!
//! The store is the only mutable shared state in the engine. Each key moves
//! through `Empty → Computing → Fresh → Stale → Computing → …`, with
//! `Computing → Stale` on failure keeping the last good value. At most one
//! computation is in flight per key: the first caller through
//! [`CacheStore::begin_compute`] becomes the leader and every concurrent
//! caller receives a subscription to the leader's outcome.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;
use tokio::sync::watch;

use crate::cashflow::EntityKind;
use crate::config::PerformanceConfig;

use super::{
    CacheEntry, CacheKey, CacheLookup, CachedValue, ComputeOutcome, EntryState, Freshness,
};

/// Cheaply cloneable handle to the shared cache state.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    entries: DashMap<CacheKey, CacheEntry>,
    inflight: DashMap<CacheKey, watch::Receiver<Option<ComputeOutcome>>>,
    /// fund id → ids of portfolios known to contain it, learned from prior
    /// portfolio computations and used to cascade invalidations.
    memberships: DashMap<String, HashSet<String>>,
    config: PerformanceConfig,
}

/// Role handed to a caller that asked to recompute a key.
pub enum ComputeRole {
    /// This caller runs the computation and must publish or fail through
    /// the guard.
    Leader(ComputeGuard),
    /// Another computation is already in flight; await its outcome.
    Joiner(watch::Receiver<Option<ComputeOutcome>>),
}

impl CacheStore {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                inflight: DashMap::new(),
                memberships: DashMap::new(),
                config,
            }),
        }
    }

    /// What a reader finds under the key right now. A Fresh entry past its
    /// staleness deadline is downgraded to Stale on the way out.
    pub fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let now = Utc::now();
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            return CacheLookup::Empty;
        };

        if entry.state == EntryState::Fresh {
            if let Some(deadline) = entry.staleness_deadline {
                if now >= deadline {
                    debug!("Cache entry {key} passed its staleness deadline");
                    entry.state = EntryState::Stale;
                }
            }
        }

        match (entry.state, entry.value.clone()) {
            (EntryState::Fresh, Some(value)) => CacheLookup::Fresh(value),
            (_, value) => CacheLookup::Stale(value),
        }
    }

    /// Atomically either makes the caller the single-flight leader for the
    /// key or hands back a subscription to the in-flight computation.
    pub fn begin_compute(&self, key: &CacheKey) -> ComputeRole {
        match self.inner.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                ComputeRole::Joiner(occupied.get().clone())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx);

                let mut entry = self
                    .inner
                    .entries
                    .entry(key.clone())
                    .or_insert_with(CacheEntry::empty);
                entry.state = EntryState::Computing;
                drop(entry);

                debug!("Cache entry {key} entered Computing");
                ComputeRole::Leader(ComputeGuard {
                    inner: Arc::clone(&self.inner),
                    key: key.clone(),
                    tx,
                    started_at: Utc::now(),
                    completed: false,
                })
            }
        }
    }

    /// Marks the entity's own key Stale and cascades: a fund invalidation
    /// also marks every portfolio known to contain it and the dashboard; a
    /// portfolio invalidation marks the dashboard. Never recomputes;
    /// recomputation is reader-driven.
    pub fn invalidate(&self, entity_id: &str, entity_kind: EntityKind) {
        let now = Utc::now();
        match entity_kind {
            EntityKind::Fund => {
                self.inner.mark_stale(&CacheKey::Fund(entity_id.to_string()), now);
                if let Some(portfolios) = self.inner.memberships.get(entity_id) {
                    for portfolio_id in portfolios.iter() {
                        self.inner
                            .mark_stale(&CacheKey::Portfolio(portfolio_id.clone()), now);
                    }
                }
                self.inner.mark_stale(&CacheKey::Dashboard, now);
            }
            EntityKind::Portfolio => {
                self.inner
                    .mark_stale(&CacheKey::Portfolio(entity_id.to_string()), now);
                self.inner.mark_stale(&CacheKey::Dashboard, now);
            }
        }
    }

    /// Records which funds a portfolio currently holds, replacing what was
    /// previously known for that portfolio.
    pub fn record_portfolio_membership(&self, portfolio_id: &str, fund_ids: &[String]) {
        for mut funds in self.inner.memberships.iter_mut() {
            funds.value_mut().remove(portfolio_id);
        }
        for fund_id in fund_ids {
            self.inner
                .memberships
                .entry(fund_id.clone())
                .or_default()
                .insert(portfolio_id.to_string());
        }
    }

    /// Freshness of the entry under the key, if one exists.
    pub fn freshness(&self, key: &CacheKey) -> Option<Freshness> {
        let now = Utc::now();
        let entry = self.inner.entries.get(key)?;
        let within_deadline = entry
            .staleness_deadline
            .map_or(true, |deadline| now < deadline);
        match entry.state {
            EntryState::Fresh if within_deadline => Some(Freshness::Fresh),
            _ => Some(Freshness::Stale),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl StoreInner {
    fn mark_stale(&self, key: &CacheKey, now: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.invalidated_at = Some(now);
            // A Computing entry keeps its state; the supersede rule in
            // `publish` lands the in-flight result Stale instead.
            if entry.state != EntryState::Computing {
                entry.state = EntryState::Stale;
            }
            debug!("Cache entry {key} invalidated");
        }
    }

    fn publish(&self, key: &CacheKey, value: CachedValue, started_at: DateTime<Utc>) -> Freshness {
        let now = Utc::now();
        let mut entry = self.entries.entry(key.clone()).or_insert_with(CacheEntry::empty);

        // A result computed from inputs older than the latest invalidation
        // is published Stale so the next read recomputes.
        let superseded = entry
            .invalidated_at
            .is_some_and(|invalidated_at| invalidated_at > started_at);

        entry.value = Some(value);
        entry.computed_at = Some(now);
        if superseded {
            entry.state = EntryState::Stale;
            entry.staleness_deadline = None;
            Freshness::Stale
        } else {
            entry.state = EntryState::Fresh;
            entry.staleness_deadline = self
                .max_age_secs(key)
                .map(|secs| now + Duration::seconds(secs));
            Freshness::Fresh
        }
    }

    fn revert(&self, key: &CacheKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.state = EntryState::Stale;
        }
    }

    fn max_age_secs(&self, key: &CacheKey) -> Option<i64> {
        match key {
            CacheKey::Fund(_) => self.config.fund_max_age_secs,
            CacheKey::Portfolio(_) => self.config.portfolio_max_age_secs,
            CacheKey::Dashboard => self.config.dashboard_max_age_secs,
        }
    }
}

/// Completion handle held by the single-flight leader.
///
/// Exactly one of [`publish`](ComputeGuard::publish) or
/// [`fail`](ComputeGuard::fail) must be called; dropping the guard without
/// either (a panic, a cancelled task) reverts the entry to Stale and
/// releases the key so the next reader can retry.
pub struct ComputeGuard {
    inner: Arc<StoreInner>,
    key: CacheKey,
    tx: watch::Sender<Option<ComputeOutcome>>,
    started_at: DateTime<Utc>,
    completed: bool,
}

impl ComputeGuard {
    /// Atomically replaces the entry with the new value and wakes joiners.
    /// Returns Stale when an invalidation superseded this computation.
    pub fn publish(mut self, value: CachedValue) -> Freshness {
        let freshness = self.inner.publish(&self.key, value.clone(), self.started_at);
        self.inner.inflight.remove(&self.key);
        let _ = self.tx.send(Some(ComputeOutcome::Published(value, freshness)));
        self.completed = true;
        debug!("Cache entry {} published as {:?}", self.key, freshness);
        freshness
    }

    /// Reverts the entry to Stale, keeping any prior value, and reports the
    /// failure to joiners.
    pub fn fail(mut self, message: String) {
        self.inner.revert(&self.key);
        self.inner.inflight.remove(&self.key);
        let _ = self.tx.send(Some(ComputeOutcome::Failed(message)));
        self.completed = true;
    }
}

impl Drop for ComputeGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.inner.revert(&self.key);
            self.inner.inflight.remove(&self.key);
            let _ = self
                .tx
                .send(Some(ComputeOutcome::Failed("computation abandoned".to_string())));
        }
    }
}
