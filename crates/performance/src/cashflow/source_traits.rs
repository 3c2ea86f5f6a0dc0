//! Read-only traits for the source-data collaborators.
//!
//! The storage layer owning the activity log and valuation records
//! implements this trait; the engine never writes back through it.

use async_trait::async_trait;

use crate::errors::Result;

use super::{CashFlowEvent, Valuation};

/// Read-only access to cash-flow activity, valuations, and the active
/// entity hierarchy.
#[async_trait]
pub trait PerformanceSourceTrait: Send + Sync {
    /// All recorded cash-flow events for the entity, in storage order.
    async fn list_cash_flow_events(&self, entity_id: &str) -> Result<Vec<CashFlowEvent>>;

    /// All recorded valuations for the entity, in storage order.
    async fn list_valuations(&self, entity_id: &str) -> Result<Vec<Valuation>>;

    /// The ids of the active funds held by the portfolio.
    async fn list_active_funds_for_portfolio(&self, portfolio_id: &str) -> Result<Vec<String>>;

    /// The ids of all active portfolios.
    async fn list_active_portfolios(&self) -> Result<Vec<String>>;
}
