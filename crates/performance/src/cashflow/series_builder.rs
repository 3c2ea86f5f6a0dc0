//! Assembles the cash-flow series an IRR computation runs on.

use std::sync::Arc;

use log::debug;

use crate::errors::{Error, Result};

use super::{CashFlowEvent, CashFlowKind, CashFlowSeries, EntityKind, PerformanceSourceTrait, Valuation};

/// Builds a [`CashFlowSeries`] for one entity from the read-only source
/// collaborators. Side-effect free.
#[derive(Clone)]
pub struct SeriesBuilder {
    source: Arc<dyn PerformanceSourceTrait>,
}

impl SeriesBuilder {
    pub fn new(source: Arc<dyn PerformanceSourceTrait>) -> Self {
        Self { source }
    }

    /// Fetches the entity's activity and valuations and assembles them into
    /// a series: valuation anchors are dropped, events are sorted by date,
    /// same-day entries of the same kind are collapsed by summation (never
    /// last-write-wins), and the latest valuation dated on or after the
    /// last event closes the series.
    ///
    /// Fails with [`Error::NoData`] when the entity has no flow events and
    /// with [`Error::IncompleteData`] when no terminal valuation exists.
    pub async fn build(&self, entity_id: &str, entity_kind: EntityKind) -> Result<CashFlowSeries> {
        let mut events = self.source.list_cash_flow_events(entity_id).await?;
        events.retain(|e| e.kind != CashFlowKind::ValuationAnchor);

        if events.is_empty() {
            return Err(Error::NoData(entity_id.to_string()));
        }

        events.sort_by_key(|e| e.event_date);

        // Collapse same-day entries of the same kind into one summed entry.
        let mut collapsed: Vec<CashFlowEvent> = Vec::with_capacity(events.len());
        for event in events {
            match collapsed
                .iter_mut()
                .find(|c| c.event_date == event.event_date && c.kind == event.kind)
            {
                Some(existing) => existing.amount += event.amount,
                None => collapsed.push(event),
            }
        }

        let last_event_date = collapsed
            .last()
            .map(|e| e.event_date)
            .ok_or_else(|| Error::NoData(entity_id.to_string()))?;

        let terminal = self.latest_valuation_on_or_after(entity_id, last_event_date).await?;

        debug!(
            "Built cash-flow series for {} '{}': {} flows, terminal valuation {} on {}",
            entity_kind,
            entity_id,
            collapsed.len(),
            terminal.amount,
            terminal.as_of_date
        );

        Ok(CashFlowSeries::new(entity_id.to_string(), collapsed, terminal))
    }

    async fn latest_valuation_on_or_after(
        &self,
        entity_id: &str,
        date: chrono::NaiveDate,
    ) -> Result<Valuation> {
        let valuations = self.source.list_valuations(entity_id).await?;
        valuations
            .into_iter()
            .filter(|v| v.as_of_date >= date)
            .max_by_key(|v| v.as_of_date)
            .ok_or_else(|| Error::IncompleteData(entity_id.to_string()))
    }
}
