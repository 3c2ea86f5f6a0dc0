//! Cash-flow series assembly.
//!
//! Defines the cash-flow domain model, the read-only traits the storage
//! layer implements, and the builder that turns raw activity and valuation
//! records into the series the IRR solver consumes.

mod cashflow_model;
mod series_builder;
mod source_traits;

pub use cashflow_model::*;
pub use series_builder::*;
pub use source_traits::*;
