//! Unified error type for the ANN graph core.
//!
//! Every failure mode described in the error-handling design surfaces
//! synchronously through this enum; the core never retries internally.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, searching, or (de)serializing an
/// ANN graph or PQ codec.
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong dimension, non-positive counts, unknown similarity, unsupported
    /// container version.
    #[error("[ANN-001] invalid argument: {0}")]
    InvalidArgument(String),

    /// Ordinal outside the current bounds of a vector source or graph.
    #[error("[ANN-002] ordinal {ordinal} out of bounds (size {size})")]
    IndexOutOfBounds {
        /// The offending ordinal.
        ordinal: u32,
        /// The current collection size.
        size: u32,
    },

    /// A programming error: save before `set_all_mutations_completed`,
    /// diversity fed unsorted candidates, invalid chunk arithmetic.
    #[error("[ANN-003] invariant violated: {0}")]
    InvariantViolation(String),

    /// A similarity is not supported on a given kernel path (e.g. cosine in
    /// the SDC triangular-table path).
    #[error("[ANN-004] unsupported: {0}")]
    Unsupported(String),

    /// Propagated unchanged from an underlying reader/writer.
    #[error("[ANN-005] I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl Error {
    /// Stable error code, e.g. `"ANN-002"`, for log correlation.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "ANN-001",
            Self::IndexOutOfBounds { .. } => "ANN-002",
            Self::InvariantViolation(_) => "ANN-003",
            Self::Unsupported(_) => "ANN-004",
            Self::IoFailure(_) => "ANN-005",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(Error::InvalidArgument("x".into()).code(), "ANN-001");
        assert_eq!(
            Error::IndexOutOfBounds { ordinal: 3, size: 2 }.code(),
            "ANN-002"
        );
        assert_eq!(Error::InvariantViolation("x".into()).code(), "ANN-003");
        assert_eq!(Error::Unsupported("x".into()).code(), "ANN-004");
    }
}
