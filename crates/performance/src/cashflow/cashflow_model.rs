use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of entity a cash-flow stream and its cached result belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Fund,
    Portfolio,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Fund => write!(f, "fund"),
            EntityKind::Portfolio => write!(f, "portfolio"),
        }
    }
}

/// Classification of an activity-log entry for cash-flow purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CashFlowKind {
    Contribution,
    Withdrawal,
    Fee,
    /// Bookkeeping marker tied to a valuation record. Carries no investable
    /// flow and is dropped when building a series.
    ValuationAnchor,
}

/// A dated, signed amount affecting a fund or portfolio.
///
/// Amounts are recorded as magnitudes in the activity log; the investor-
/// perspective sign is derived from the kind (see [`CashFlowEvent::signed_amount`]).
/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEvent {
    pub event_date: NaiveDate,
    pub amount: Decimal,
    pub kind: CashFlowKind,
}

impl CashFlowEvent {
    pub fn new(event_date: NaiveDate, amount: Decimal, kind: CashFlowKind) -> Self {
        Self {
            event_date,
            amount,
            kind,
        }
    }

    /// The flow from the investor's perspective: money handed to the fund
    /// (contributions, fees) is negative, money returned (withdrawals) is
    /// positive. Valuation anchors carry no flow.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            CashFlowKind::Contribution | CashFlowKind::Fee => -self.amount.abs(),
            CashFlowKind::Withdrawal => self.amount.abs(),
            CashFlowKind::ValuationAnchor => Decimal::ZERO,
        }
    }
}

/// A point-in-time market value of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub as_of_date: NaiveDate,
    pub amount: Decimal,
}

impl Valuation {
    pub fn new(as_of_date: NaiveDate, amount: Decimal) -> Self {
        Self { as_of_date, amount }
    }
}

/// An ordered cash-flow stream plus the terminal valuation that closes it.
///
/// Invariants (enforced by the builder): event dates are non-decreasing and
/// same-day entries of the same kind are already collapsed; the terminal
/// valuation is dated on or after the last event. The terminal valuation is
/// treated as a final positive flow, as if the position were liquidated on
/// that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowSeries {
    pub entity_id: String,
    pub events: Vec<CashFlowEvent>,
    pub terminal_valuation: Valuation,
}

impl CashFlowSeries {
    pub fn new(entity_id: String, events: Vec<CashFlowEvent>, terminal_valuation: Valuation) -> Self {
        Self {
            entity_id,
            events,
            terminal_valuation,
        }
    }

    /// The series as strictly date-ascending `(date, signed flow)` pairs,
    /// with all flows sharing a date netted together and the terminal
    /// valuation appended as a final positive flow. This is the solver's
    /// input shape.
    pub fn dated_flows(&self) -> Vec<(NaiveDate, Decimal)> {
        let mut flows: Vec<(NaiveDate, Decimal)> = Vec::new();
        for event in &self.events {
            let signed = event.signed_amount();
            match flows.last_mut() {
                Some((date, amount)) if *date == event.event_date => *amount += signed,
                _ => flows.push((event.event_date, signed)),
            }
        }
        let terminal = self.terminal_valuation.amount.abs();
        match flows.last_mut() {
            Some((date, amount)) if *date == self.terminal_valuation.as_of_date => {
                *amount += terminal
            }
            _ => flows.push((self.terminal_valuation.as_of_date, terminal)),
        }
        flows
    }

    /// SHA-256 over the canonical rendering of the series, hex-encoded.
    /// Recorded on every computed result so callers can tell which inputs
    /// produced it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.entity_id.as_bytes());
        for event in &self.events {
            hasher.update(
                format!("|{}:{:?}:{}", event.event_date, event.kind, event.amount).as_bytes(),
            );
        }
        hasher.update(
            format!(
                "|terminal:{}:{}",
                self.terminal_valuation.as_of_date, self.terminal_valuation.amount
            )
            .as_bytes(),
        );
        hex::encode(hasher.finalize())
    }
}
