//! Execution primitives for qpipe.
//!
//! Two ways to turn compiled circuits into numbers:
//!
//! - [`Sampler`] runs measured circuits and returns a [`QuasiDistribution`]
//!   per circuit (observed count / shots).
//! - [`Estimator`] takes parallel arrays of circuits, [`Observable`]s and
//!   optional parameter bindings and returns one expectation value per index.
//!
//! Both treat the backend as an opaque async function from (circuit, shots)
//! to counts. Dispatches for a batch run concurrently; each one may be
//! bounded by a timeout and abandoned through a [`CancellationToken`]. A
//! failing input never hides the results of the others: the outer `Result`
//! rejects malformed calls, the inner one reports per-index failures.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qpipe_adapter_sim::SimulatorBackend;
//! use qpipe_compile::CompiledCircuit;
//! use qpipe_ir::{CircuitBuilder, QubitId};
//! use qpipe_primitives::{Estimator, Observable};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = CircuitBuilder::new("bell", 2, 0);
//! builder.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//! let circuit = CompiledCircuit::unmapped(builder.build());
//!
//! let estimator = Estimator::new(Arc::new(SimulatorBackend::new()));
//! let zz: Observable = "ZZ".parse()?;
//! let values = estimator.run(&[circuit], &[zz], &[]).await?;
//! assert!((values[0].clone()? - 1.0).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
mod dispatch;
pub mod error;
pub mod estimator;
pub mod observable;
pub mod quasi;
pub mod sampler;

pub use cancel::CancellationToken;
pub use error::{PrimitiveError, PrimitiveResult};
pub use estimator::Estimator;
pub use observable::{MeasurementGroup, Observable, Pauli, PauliTerm};
pub use quasi::QuasiDistribution;
pub use sampler::{DEFAULT_SHOTS, Sampler};
