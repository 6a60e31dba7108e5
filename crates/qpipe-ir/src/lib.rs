//! Circuit intermediate representation for the qpipe compiler.
//!
//! A [`Circuit`] is a frozen, validated sequence of operations over a fixed
//! number of qubits and classical bits. Circuits are produced by an
//! append-only [`CircuitBuilder`] (or [`Circuit::from_ops`]), which rejects
//! malformed operations with the index of the offending op. Compilation
//! passes never mutate a circuit; they build a new one.
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use qpipe_ir::{CircuitBuilder, QubitId};
//!
//! let mut builder = CircuitBuilder::new("bell_state", 2, 2);
//! builder.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?.measure_all()?;
//! let circuit = builder.build();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.depth(), 3);
//! # Ok::<(), qpipe_ir::IrError>(())
//! ```
//!
//! # Example: Parameterized Circuit
//!
//! ```rust
//! use qpipe_ir::{CircuitBuilder, ParameterBindings, ParameterExpression, QubitId};
//!
//! let mut builder = CircuitBuilder::new("variational", 1, 0);
//! builder.rx(ParameterExpression::symbol("theta"), QubitId(0))?;
//! let circuit = builder.build();
//! assert!(circuit.is_parameterized());
//!
//! let mut bindings = ParameterBindings::new();
//! bindings.insert("theta".into(), 0.25);
//! assert!(!circuit.bind_parameters(&bindings).is_parameterized());
//! # Ok::<(), qpipe_ir::IrError>(())
//! ```

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::{Circuit, CircuitBuilder};
pub use dag::{CircuitDag, NodeIndex, WireId};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, GateKind, StandardGate};
pub use instruction::{Instruction, InstructionKind};
pub use parameter::{ParameterBindings, ParameterExpression};
pub use qubit::{ClbitId, QubitId};
