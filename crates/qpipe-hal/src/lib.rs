//! qpipe Hardware Abstraction Layer
//!
//! The execution side of qpipe treats a backend as an opaque async function
//! from (compiled circuit, shot count) to raw counts. This crate defines that
//! seam:
//! - the [`Backend`] trait,
//! - [`Capabilities`] describing a backend's limits,
//! - [`Counts`] and [`ExecutionResult`] for what comes back,
//! - [`HalError`] for what can go wrong.
//!
//! # Implementing a Backend
//!
//! ```rust
//! use async_trait::async_trait;
//! use qpipe_hal::{Backend, Capabilities, Counts, ExecutionResult, HalResult};
//! use qpipe_ir::Circuit;
//!
//! struct AllZeros {
//!     capabilities: Capabilities,
//! }
//!
//! #[async_trait]
//! impl Backend for AllZeros {
//!     fn name(&self) -> &str { "all_zeros" }
//!
//!     fn capabilities(&self) -> &Capabilities {
//!         &self.capabilities
//!     }
//!
//!     async fn execute(&self, circuit: &Circuit, shots: u32) -> HalResult<ExecutionResult> {
//!         let zeros = "0".repeat(circuit.num_clbits() as usize);
//!         Ok(ExecutionResult::new(Counts::from_pairs([(zeros, u64::from(shots))]), shots))
//!     }
//! }
//! ```

pub mod backend;
pub mod capability;
pub mod error;
pub mod result;

pub use backend::{Backend, ValidationResult};
pub use capability::Capabilities;
pub use error::{HalError, HalResult};
pub use result::{Counts, ExecutionResult};
