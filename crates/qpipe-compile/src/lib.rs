//! qpipe compilation pipeline
//!
//! This crate turns an abstract circuit into one that runs on a constrained
//! device: it picks an initial layout, routes two-qubit operations onto
//! coupled qubits, translates every gate into the native basis, collapses
//! single-qubit runs and fills idle windows with decoupling sequences.
//!
//! # Architecture
//!
//! ```text
//! Input Circuit
//!       │
//!       ▼
//! ┌──────────┐
//! │ Pipeline │ ◄── Device (basis, coupling map, errors, durations)
//! └──────────┘      PipelineConfig (level, overrides, strictness)
//!       │
//!       ├── Validate             (Validated)
//!       ├── LayoutSelection      (LayoutChosen)
//!       ├── Sabre/StochasticRouting (Routed)
//!       ├── BasisTranslation     (Translated)
//!       ├── LocalOptimization    (LocallyOptimized, level ≥ 1)
//!       └── DynamicalDecoupling  (ErrorSuppressed, level ≥ 1)
//!       │
//!       ▼
//! CompiledCircuit (circuit + initial/final layout + report)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qpipe_compile::{BasisGates, CouplingMap, Device, Pipeline, PipelineConfig};
//! use qpipe_ir::Circuit;
//!
//! let device = Device::new("star", BasisGates::iqm(), CouplingMap::star(5));
//! let config = PipelineConfig::default().with_optimization_level(2).unwrap();
//! let pipeline = Pipeline::new(Arc::new(device), config).unwrap();
//!
//! let compiled = pipeline.compile(&Circuit::ghz(4).unwrap()).unwrap();
//! println!(
//!     "depth {} with {} swaps",
//!     compiled.circuit.depth(),
//!     compiled.report.swaps_inserted
//! );
//! ```
//!
//! # Optimization Levels
//!
//! | Level | Layout | Routing | Local optimization | Decoupling |
//! |-------|--------|---------|--------------------|------------|
//! | 0 | trivial | stochastic | no | no |
//! | 1–3 | vf2, falling back to sabre | sabre | yes | yes, if the device has durations |
//!
//! # Custom Passes
//!
//! ```rust
//! use qpipe_compile::{CompileResult, Pass, PropertySet, Stage};
//! use qpipe_ir::Circuit;
//!
//! struct Noop;
//!
//! impl Pass for Noop {
//!     fn name(&self) -> &str { "noop" }
//!     fn stage(&self) -> Stage { Stage::LocallyOptimized }
//!
//!     fn run(&self, circuit: Circuit, _props: &mut PropertySet) -> CompileResult<Circuit> {
//!         Ok(circuit)
//!     }
//! }
//! ```

pub mod config;
pub mod device;
pub mod equivalence;
pub mod error;
pub mod manager;
pub mod pass;
pub mod property;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use config::{
    LayoutMethod, LayoutOverride, LevelPolicy, OptimizationLevel, PipelineConfig, RoutingMethod,
    Strictness,
};
pub use device::{BasisGates, BasisPreset, CouplingMap, Device, DeviceSpec, MAX_PRESET_QUBITS};
pub use equivalence::{BasisTranslator, EquivalenceLibrary, EquivalenceRule};
pub use error::{CompileError, CompileResult};
pub use manager::{CompiledCircuit, PassManager, Pipeline};
pub use pass::{Pass, Stage};
pub use property::{CompileReport, Layout, PropertySet, StageSummary};
