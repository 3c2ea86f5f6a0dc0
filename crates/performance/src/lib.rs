//! Meridian Performance - IRR calculation and result caching.
//!
//! This crate contains the performance-calculation engine for the Meridian
//! wealth platform: cash-flow series assembly, IRR root finding, fund →
//! portfolio → dashboard aggregation, and the cache that keeps computed
//! results fresh with single-flight recomputation. It is storage-agnostic
//! and defines the read-only traits the storage layer implements.

pub mod aggregation;
pub mod cache;
pub mod cashflow;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod events;
pub mod solver;

// Re-export the domain models and the facade
pub use aggregation::*;
pub use cache::{CacheKey, CacheStore, CachedValue, Freshness};
pub use cashflow::*;
pub use config::PerformanceConfig;
pub use engine::{PerformanceEngine, PerformanceEngineTrait};
pub use events::DomainEvent;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
