//! Internal-rate-of-return root finding.
//!
//! Pure numeric code, no I/O. The contract other implementations must match
//! is the actual/365 day count and the 6-decimal rounding of the published
//! rate; the Newton-Raphson/bisection mechanics below are an implementation
//! choice.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::cashflow::CashFlowSeries;
use crate::constants::RATE_DECIMAL_PRECISION;
use crate::errors::{Error, Result};

const CONVERGENCE_TOLERANCE: Decimal = dec!(0.0000001);
const MAX_NEWTON_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const MIN_RATE: Decimal = dec!(-0.9999);
const MAX_RATE: Decimal = dec!(100);
const INITIAL_GUESS: Decimal = dec!(0.1);
const DAYS_PER_YEAR: Decimal = dec!(365);

/// Finds the periodic rate r such that Σ CF_i / (1+r)^(t_i/365) = 0, where
/// t_i is the day count from the first flow and the terminal valuation is
/// the final positive flow.
///
/// Newton-Raphson with an analytic derivative runs first; if it diverges
/// (rate escaping [-0.9999, 100], vanishing derivative, or iterations
/// exhausted) a bracketing bisection takes over. The result is rounded to
/// 6 decimal places before returning.
///
/// Fails with [`Error::Unsolvable`] when no root exists: all flows share
/// one sign, fewer than two distinct dates remain after netting, or no
/// bracketing interval contains a sign change.
pub fn solve(series: &CashFlowSeries) -> Result<Decimal> {
    let flows = prepare(series);

    if flows.len() < 2 {
        return Err(Error::Unsolvable);
    }

    let has_positive = flows.iter().any(|(_, amount)| *amount > Decimal::ZERO);
    let has_negative = flows.iter().any(|(_, amount)| *amount < Decimal::ZERO);
    if !has_positive || !has_negative {
        // NPV keeps one sign for every rate, so no root exists.
        return Err(Error::Unsolvable);
    }

    let rate = newton_raphson(&flows)
        .or_else(|| bisect(&flows))
        .ok_or(Error::Unsolvable)?;

    Ok(rate.round_dp(RATE_DECIMAL_PRECISION))
}

/// Net present value of dated flows at the given rate, discounted over
/// actual/365 year fractions from the first flow. `None` when the rate or
/// the discounted magnitudes leave the representable domain.
pub fn npv(rate: Decimal, dated_flows: &[(NaiveDate, Decimal)]) -> Option<Decimal> {
    let base_date = dated_flows.first()?.0;
    let flows: Vec<(Decimal, Decimal)> = dated_flows
        .iter()
        .map(|(date, amount)| (year_fraction(base_date, *date), *amount))
        .collect();
    npv_and_derivative(rate, &flows).map(|(value, _)| value)
}

fn prepare(series: &CashFlowSeries) -> Vec<(Decimal, Decimal)> {
    let dated = series.dated_flows();
    let Some((base_date, _)) = dated.first() else {
        return Vec::new();
    };
    let base_date = *base_date;
    dated
        .into_iter()
        .map(|(date, amount)| (year_fraction(base_date, date), amount))
        .collect()
}

fn year_fraction(base_date: NaiveDate, date: NaiveDate) -> Decimal {
    Decimal::from((date - base_date).num_days()) / DAYS_PER_YEAR
}

/// NPV and its analytic derivative with respect to the rate.
///
/// NPV(r)   = Σ CF_i (1+r)^(-y_i)
/// NPV'(r)  = Σ -y_i CF_i (1+r)^(-y_i - 1)
fn npv_and_derivative(rate: Decimal, flows: &[(Decimal, Decimal)]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    for (years, amount) in flows {
        let discount = one_plus_r.checked_powd(*years)?;
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(amount.checked_div(discount)?)?;
        derivative = derivative
            .checked_sub(years.checked_mul(*amount)?.checked_div(one_plus_r.checked_mul(discount)?)?)?;
    }
    Some((value, derivative))
}

fn newton_raphson(flows: &[(Decimal, Decimal)]) -> Option<Decimal> {
    let mut rate = INITIAL_GUESS;

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (value, derivative) = npv_and_derivative(rate, flows)?;

        if value.abs() < CONVERGENCE_TOLERANCE {
            return Some(rate);
        }
        if derivative.is_zero() {
            return None;
        }

        rate = rate.checked_sub(value.checked_div(derivative)?)?;

        if rate < MIN_RATE || rate > MAX_RATE {
            return None;
        }
    }

    None
}

/// Bracketing fallback: probe [-0.99, 0], then [0, 10] doubling the upper
/// bound up to the rate cap, and bisect the first interval whose endpoints
/// change sign.
fn bisect(flows: &[(Decimal, Decimal)]) -> Option<Decimal> {
    let value_at = |rate: Decimal| npv_and_derivative(rate, flows).map(|(value, _)| value);

    let (mut low, mut high) = find_bracket(flows)?;
    let mut low_value = value_at(low)?;

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let mid_value = value_at(mid)?;

        if mid_value.abs() < CONVERGENCE_TOLERANCE {
            return Some(mid);
        }

        if (low_value.is_sign_negative()) == (mid_value.is_sign_negative()) {
            low = mid;
            low_value = mid_value;
        } else {
            high = mid;
        }
    }

    None
}

fn find_bracket(flows: &[(Decimal, Decimal)]) -> Option<(Decimal, Decimal)> {
    let value_at = |rate: Decimal| npv_and_derivative(rate, flows).map(|(value, _)| value);

    let negative_low = dec!(-0.99);
    let zero = Decimal::ZERO;
    if let (Some(a), Some(b)) = (value_at(negative_low), value_at(zero)) {
        if sign_change(a, b) {
            return Some((negative_low, zero));
        }
    }

    let mut high = dec!(10);
    while high <= MAX_RATE {
        if let (Some(a), Some(b)) = (value_at(zero), value_at(high)) {
            if sign_change(a, b) {
                return Some((zero, high));
            }
        }
        high *= dec!(2);
    }

    None
}

fn sign_change(a: Decimal, b: Decimal) -> bool {
    (a.is_sign_negative() != b.is_sign_negative()) && !a.is_zero() && !b.is_zero()
}
