//! The query facade the API and report layers call.

use async_trait::async_trait;

use crate::aggregation::{DashboardSummary, FundIrr, PortfolioAggregate};
use crate::cache::Freshness;
use crate::cashflow::EntityKind;
use crate::errors::Result;
use crate::events::DomainEvent;

/// The only interface external collaborators use to read computed
/// performance or report source-data mutations.
///
/// Reads return the cached result together with its freshness. A stale key
/// with a servable prior value returns that value immediately while a
/// single-flight recomputation proceeds in the background; a key with no
/// prior value blocks the caller until the first computation completes.
/// Insufficient data and unsolvable series surface inside the returned
/// result as its rate outcome, never as errors.
#[async_trait]
pub trait PerformanceEngineTrait: Send + Sync {
    /// The IRR of one fund's cash-flow stream.
    async fn get_fund_irr(&self, fund_id: &str) -> Result<(FundIrr, Freshness)>;

    /// The valuation-weighted IRR roll-up of one portfolio.
    async fn get_portfolio_irr(&self, portfolio_id: &str)
        -> Result<(PortfolioAggregate, Freshness)>;

    /// Company-wide dashboard totals.
    async fn get_dashboard_summary(&self) -> Result<(DashboardSummary, Freshness)>;

    /// Administrative hook for manual cache busting. Marks the entity's
    /// cached result and every aggregate containing it stale; never
    /// recomputes eagerly.
    fn invalidate(&self, entity_id: &str, entity_kind: EntityKind);

    /// The invalidation feed: the write path reports a committed mutation.
    fn apply_event(&self, event: &DomainEvent);
}
