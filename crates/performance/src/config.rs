//! Engine configuration.

use serde::Deserialize;

use crate::constants::{DEFAULT_DASHBOARD_MAX_AGE_SECS, DEFAULT_MAX_CONCURRENT_RECOMPUTATIONS};

/// Configuration for the performance engine.
///
/// Max ages are expressed in seconds. `None` disables time-based expiry for
/// that entity kind, leaving explicit invalidation as the only way a cached
/// result goes stale. Per-fund and per-portfolio results have no forced
/// expiry by default; the dashboard aggregate defaults to 24 hours.
///
/// The engine is constructed with an explicit config instance; there is no
/// process-wide default, so tests can instantiate independent engines.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceConfig {
    pub fund_max_age_secs: Option<i64>,
    pub portfolio_max_age_secs: Option<i64>,
    pub dashboard_max_age_secs: Option<i64>,
    pub max_concurrent_recomputations: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            fund_max_age_secs: None,
            portfolio_max_age_secs: None,
            dashboard_max_age_secs: Some(DEFAULT_DASHBOARD_MAX_AGE_SECS),
            max_concurrent_recomputations: DEFAULT_MAX_CONCURRENT_RECOMPUTATIONS,
        }
    }
}
