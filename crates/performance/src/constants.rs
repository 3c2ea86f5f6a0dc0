/// Decimal precision of a published rate.
///
/// Rates are rounded to this many places before publication; the rounding
/// is the only irreversible precision loss in the engine.
pub const RATE_DECIMAL_PRECISION: u32 = 6;

/// Default maximum age of the dashboard aggregate before it is considered
/// stale even without an explicit invalidation.
pub const DEFAULT_DASHBOARD_MAX_AGE_SECS: i64 = 86_400;

/// Default width of the recomputation worker pool.
pub const DEFAULT_MAX_CONCURRENT_RECOMPUTATIONS: usize = 4;
