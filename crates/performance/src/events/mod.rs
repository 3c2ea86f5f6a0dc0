//! Domain events module.
//!
//! Provides the invalidation feed: the excluded write path reports
//! source-data mutations as domain events, and the engine translates them
//! into cache invalidations.

mod domain_event;

pub use domain_event::*;
