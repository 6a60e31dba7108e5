//! Error types for the primitives.

use std::time::Duration;

use thiserror::Error;

use qpipe_compile::CompileError;
use qpipe_hal::HalError;
use qpipe_ir::IrError;

/// Errors raised by the sampler and estimator.
///
/// Variants carrying `index` belong to one input of a batch and are reported
/// in that input's slot; the rest reject the whole call.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum PrimitiveError {
    /// A sampled circuit has no measurement.
    #[error("Circuit {index} has no measurements")]
    NoMeasurement {
        /// Input index.
        index: usize,
    },

    /// The backend did not answer in time.
    #[error("Circuit {index}: execution timed out after {timeout:?}")]
    ExecutionTimeout {
        /// Input index.
        index: usize,
        /// The configured limit.
        timeout: Duration,
    },

    /// The caller cancelled before the backend answered.
    #[error("Circuit {index}: execution cancelled")]
    Cancelled {
        /// Input index.
        index: usize,
    },

    /// The backend reported a failure. May be transient.
    #[error("Circuit {index}: backend error: {source}")]
    Backend {
        /// Input index.
        index: usize,
        /// What the backend said.
        #[source]
        source: HalError,
    },

    /// Building a measurement circuit failed.
    #[error("Circuit {index}: {source}")]
    Ir {
        /// Input index.
        index: usize,
        /// Underlying IR error.
        #[source]
        source: IrError,
    },

    /// Basis-change gates could not be expressed on the attached device.
    #[error("Circuit {index}: {source}")]
    Compile {
        /// Input index.
        index: usize,
        /// Underlying compile error.
        #[source]
        source: CompileError,
    },

    /// Parallel input arrays disagree in length.
    #[error("Shape mismatch: {what} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        /// Which input.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An observable does not fit its circuit, or failed to parse.
    #[error("Invalid observable: {0}")]
    InvalidObservable(String),

    /// A circuit still has free parameters after binding.
    #[error("Circuit {index}: unbound parameters {names:?}")]
    UnboundParameter {
        /// Input index.
        index: usize,
        /// Names still free.
        names: Vec<String>,
    },

    /// Shot count of zero.
    #[error("Shot count must be positive")]
    InvalidShots,
}

impl PrimitiveError {
    /// True for failures a caller may sensibly retry.
    pub fn is_transient(&self) -> bool {
        match self {
            PrimitiveError::ExecutionTimeout { .. } => true,
            PrimitiveError::Backend { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Input index the error belongs to, if it is per-index.
    pub fn index(&self) -> Option<usize> {
        match self {
            PrimitiveError::NoMeasurement { index }
            | PrimitiveError::ExecutionTimeout { index, .. }
            | PrimitiveError::Cancelled { index }
            | PrimitiveError::Backend { index, .. }
            | PrimitiveError::Ir { index, .. }
            | PrimitiveError::Compile { index, .. }
            | PrimitiveError::UnboundParameter { index, .. } => Some(*index),
            PrimitiveError::ShapeMismatch { .. }
            | PrimitiveError::InvalidObservable(_)
            | PrimitiveError::InvalidShots => None,
        }
    }
}

/// Result type for primitive operations.
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;
