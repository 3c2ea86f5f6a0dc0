//! Valuation-weighted roll-ups: fund → portfolio → dashboard.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::constants::RATE_DECIMAL_PRECISION;

use super::{DashboardSummary, FundIrr, PortfolioAggregate, RateOutcome};

/// Rolls constituent fund IRRs into one portfolio-level weighted IRR.
///
/// Weighted IRR = Σ(rate_i × valuation_i) / Σ(valuation_i) over constituents
/// with both a numeric rate and a known valuation. Excluded constituents
/// flip the `partial` flag; when every constituent is excluded the portfolio
/// rate is `Unsolvable`. `total_valuation` sums all known valuations, not
/// just the weighted ones.
pub fn aggregate_portfolio(
    portfolio_id: &str,
    constituents: Vec<(FundIrr, Option<Decimal>)>,
) -> PortfolioAggregate {
    let mut numerator = Decimal::ZERO;
    let mut denominator = Decimal::ZERO;
    let mut total_valuation = Decimal::ZERO;
    let mut partial = false;

    for (fund, valuation) in &constituents {
        if let Some(valuation) = valuation {
            total_valuation += valuation;
        }
        match (fund.rate.rate(), valuation) {
            (Some(rate), Some(valuation)) => {
                numerator += rate * valuation;
                denominator += valuation;
            }
            _ => partial = true,
        }
    }

    let weighted_irr = if denominator > Decimal::ZERO {
        RateOutcome::Rate((numerator / denominator).round_dp(RATE_DECIMAL_PRECISION))
    } else {
        RateOutcome::Unsolvable
    };

    PortfolioAggregate {
        portfolio_id: portfolio_id.to_string(),
        weighted_irr,
        fund_irrs: constituents.into_iter().map(|(fund, _)| fund).collect(),
        total_valuation,
        partial,
        computed_at: Utc::now(),
    }
}

/// Rolls portfolio aggregates into the company-wide dashboard summary,
/// applying the same weighting rule one level up: each portfolio's weighted
/// IRR is weighted by its total valuation.
pub fn aggregate_dashboard(
    aggregates: &[PortfolioAggregate],
    active_product_count: usize,
) -> DashboardSummary {
    let mut numerator = Decimal::ZERO;
    let mut denominator = Decimal::ZERO;
    let mut total_fum = Decimal::ZERO;

    for aggregate in aggregates {
        total_fum += aggregate.total_valuation;
        if let Some(rate) = aggregate.weighted_irr.rate() {
            if aggregate.total_valuation > Decimal::ZERO {
                numerator += rate * aggregate.total_valuation;
                denominator += aggregate.total_valuation;
            }
        }
    }

    let company_irr = if denominator > Decimal::ZERO {
        RateOutcome::Rate((numerator / denominator).round_dp(RATE_DECIMAL_PRECISION))
    } else {
        RateOutcome::Unsolvable
    };

    DashboardSummary {
        total_fum,
        total_active_products: active_product_count,
        total_active_clients: aggregates.len(),
        company_irr,
        computed_at: Utc::now(),
    }
}
