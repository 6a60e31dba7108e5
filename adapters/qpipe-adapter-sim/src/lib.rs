//! Local statevector simulator backend for qpipe.
//!
//! Exact statevector simulation, sampled to produce shot counts. Intended for
//! tests, the CLI `run` command and small experiments; memory grows as
//! 16 bytes × 2^n.
//!
//! | Qubits | Memory |
//! |--------|--------|
//! | 10 | ~16 KB |
//! | 20 | ~16 MB |
//! | 24 | ~256 MB |
//!
//! # Example
//!
//! ```rust
//! use qpipe_adapter_sim::SimulatorBackend;
//! use qpipe_hal::Backend;
//! use qpipe_ir::Circuit;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SimulatorBackend::new().with_seed(42);
//! let result = backend.execute(&Circuit::bell()?, 1000).await?;
//!
//! // Only correlated outcomes.
//! assert_eq!(result.counts.get("00") + result.counts.get("11"), 1000);
//! # Ok(())
//! # }
//! ```

mod simulator;
mod statevector;

pub use simulator::{DEFAULT_MAX_QUBITS, SimulatorBackend};
pub use statevector::Statevector;
