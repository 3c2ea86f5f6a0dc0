use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregation::{DashboardSummary, FundIrr, PortfolioAggregate};
use crate::cashflow::EntityKind;

/// Key addressing one cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Fund(String),
    Portfolio(String),
    Dashboard,
}

impl CacheKey {
    pub fn for_entity(entity_id: &str, entity_kind: EntityKind) -> Self {
        match entity_kind {
            EntityKind::Fund => CacheKey::Fund(entity_id.to_string()),
            EntityKind::Portfolio => CacheKey::Portfolio(entity_id.to_string()),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Fund(id) => write!(f, "fund:{id}"),
            CacheKey::Portfolio(id) => write!(f, "portfolio:{id}"),
            CacheKey::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// Lifecycle state of a cache entry. An absent entry is the Empty state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// A single-flight recomputation is in flight for the key.
    Computing,
    Fresh,
    Stale,
}

/// Whether a served value was current at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    Fresh,
    Stale,
}

/// One computed result. Published as a whole; readers never observe a
/// partially-updated aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Fund(FundIrr),
    Portfolio(PortfolioAggregate),
    Dashboard(DashboardSummary),
}

impl CachedValue {
    pub fn into_fund(self) -> Option<FundIrr> {
        match self {
            CachedValue::Fund(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_portfolio(self) -> Option<PortfolioAggregate> {
        match self {
            CachedValue::Portfolio(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_dashboard(self) -> Option<DashboardSummary> {
        match self {
            CachedValue::Dashboard(value) => Some(value),
            _ => None,
        }
    }
}

/// Per-key entry. Created Stale and valueless on first miss; publication
/// replaces value, timestamps, and state together.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub state: EntryState,
    pub value: Option<CachedValue>,
    pub computed_at: Option<DateTime<Utc>>,
    pub staleness_deadline: Option<DateTime<Utc>>,
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub(crate) fn empty() -> Self {
        Self {
            state: EntryState::Stale,
            value: None,
            computed_at: None,
            staleness_deadline: None,
            invalidated_at: None,
        }
    }
}

/// What a reader found under a key.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A current value; serve it as-is.
    Fresh(CachedValue),
    /// The key needs recomputation; any prior value is still servable.
    Stale(Option<CachedValue>),
    /// Nothing recorded under the key yet.
    Empty,
}

/// Terminal result of an in-flight computation, broadcast to joiners.
#[derive(Debug, Clone)]
pub enum ComputeOutcome {
    Published(CachedValue, Freshness),
    Failed(String),
}
