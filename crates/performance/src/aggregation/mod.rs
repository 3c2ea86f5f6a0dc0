//! Result models and valuation-weighted aggregation.

mod aggregation_model;
mod aggregator;

pub use aggregation_model::*;
pub use aggregator::*;
