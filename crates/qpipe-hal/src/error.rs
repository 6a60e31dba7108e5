//! Error types for the HAL crate.

use thiserror::Error;

/// Errors a backend can report for one execution.
///
/// The core never retries; [`HalError::is_transient`] tells the caller which
/// failures are worth retrying unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Backend cannot take work right now.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the circuit but the run failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// The circuit contains something the backend cannot execute.
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// More qubits than the backend has.
    #[error("Circuit exceeds backend capabilities: {0}")]
    CircuitTooLarge(String),

    /// Shot count outside the backend's range.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Anything else, including a crashed worker.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl HalError {
    /// True if resubmitting the same circuit might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HalError::Unavailable(_) | HalError::JobFailed(_) | HalError::Backend(_)
        )
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(HalError::JobFailed("queue reset".into()).is_transient());
        assert!(!HalError::InvalidShots("0".into()).is_transient());
        assert!(!HalError::CircuitTooLarge("30 > 24".into()).is_transient());
    }
}
