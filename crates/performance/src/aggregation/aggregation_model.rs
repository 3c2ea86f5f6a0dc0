use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cashflow::EntityKind;

/// Tri-state outcome of a rate computation.
///
/// Distinguishes "we could not compute" from "we computed zero": a missing
/// history and an unsolvable series are valid business outcomes, not
/// nullable floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum RateOutcome {
    /// A solved rate, rounded to the published precision.
    Rate(Decimal),
    /// The cash-flow series admits no internal rate of return.
    Unsolvable,
    /// Not enough cash-flow history to attempt a solve.
    InsufficientData,
}

impl RateOutcome {
    pub fn rate(&self) -> Option<Decimal> {
        match self {
            RateOutcome::Rate(rate) => Some(*rate),
            _ => None,
        }
    }

    pub fn is_rate(&self) -> bool {
        matches!(self, RateOutcome::Rate(_))
    }
}

/// The IRR computed for one entity's cash-flow stream.
///
/// Owned by the cache store and recreated whole on every recomputation,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundIrr {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub rate: RateOutcome,
    pub computed_at: DateTime<Utc>,
    /// Hash of the cash-flow series the rate was derived from; empty when
    /// the entity had no usable series.
    pub input_fingerprint: String,
}

/// Valuation-weighted roll-up of a portfolio's constituent fund IRRs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAggregate {
    pub portfolio_id: String,
    pub weighted_irr: RateOutcome,
    pub fund_irrs: Vec<FundIrr>,
    pub total_valuation: Decimal,
    /// True when at least one constituent was excluded from the weighting
    /// (unsolvable or insufficient data), so the aggregate is incomplete.
    pub partial: bool,
    pub computed_at: DateTime<Utc>,
}

/// Company-wide dashboard totals, one level above portfolios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_fum: Decimal,
    pub total_active_products: usize,
    pub total_active_clients: usize,
    pub company_irr: RateOutcome,
    pub computed_at: DateTime<Utc>,
}
