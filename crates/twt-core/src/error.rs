//! Engine error types.

use thiserror::Error;

/// Errors raised by range resolution and report assembly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// All recorded data was requested but the store holds no events.
    #[error("no recorded events, cannot resolve a window over all data")]
    NoData,

    /// A range, unit or grouping value outside the closed set of selections.
    #[error("invalid {kind}: {value}")]
    InvalidSelection { kind: &'static str, value: String },
}

/// Errors from [`crate::report::generate`].
#[derive(Debug, Error)]
pub enum ReportError {
    /// The engine rejected the request.
    #[error(transparent)]
    Engine(#[from] Error),

    /// The event store failed; the source is passed through unchanged.
    #[error("event store failed")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ReportError {
    /// Wraps a store error.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
