//! Error types for the performance engine.
//!
//! This module defines storage-agnostic error types. Collaborator-specific
//! failures (SQL, HTTP, etc.) are converted into `SourceError` by the
//! storage layer before they reach the engine.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the performance engine.
///
/// `NoData`, `IncompleteData`, and `Unsolvable` describe the source data
/// rather than a system fault; the query facade folds them into the rate
/// outcome of the returned result instead of surfacing them as failures.
#[derive(Error, Debug)]
pub enum Error {
    /// The entity has no cash-flow history to derive a rate from.
    #[error("Insufficient cash-flow history for entity '{0}'")]
    NoData(String),

    /// No valuation is dated on or after the entity's last cash flow.
    #[error("No terminal valuation for entity '{0}'")]
    IncompleteData(String),

    /// The cash-flow series admits no internal rate of return.
    #[error("No internal rate of return exists for the series")]
    Unsolvable,

    #[error("Source data access failed: {0}")]
    Source(#[from] SourceError),

    #[error("Performance computation failed: {0}")]
    Computation(String),
}

/// Storage-agnostic error type for source-data access.
///
/// This enum uses `String` for all error details, allowing the storage
/// layer to convert storage-specific errors into this format.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The requested entity does not exist in the system of record.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// A source query failed to execute.
    #[error("Source query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// True when the error describes the data itself (a valid business
    /// outcome) rather than a system failure.
    pub fn is_data_outcome(&self) -> bool {
        matches!(
            self,
            Error::NoData(_) | Error::IncompleteData(_) | Error::Unsolvable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_outcomes_are_not_system_failures() {
        assert!(Error::NoData("f-1".to_string()).is_data_outcome());
        assert!(Error::IncompleteData("f-1".to_string()).is_data_outcome());
        assert!(Error::Unsolvable.is_data_outcome());
        assert!(!Error::Computation("boom".to_string()).is_data_outcome());
        assert!(!Error::Source(SourceError::QueryFailed("down".to_string())).is_data_outcome());
    }
}
