//! Pass manager and the compilation pipeline built on it.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use qpipe_ir::{Circuit, QubitId};

use crate::config::{LayoutOverride, PipelineConfig, RoutingMethod, Strictness};
use crate::device::Device;
use crate::equivalence::{BasisTranslator, EquivalenceLibrary};
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, Stage};
use crate::passes::{
    BasisTranslation, DynamicalDecoupling, LayoutSelection, LocalOptimization, SabreRouting,
    StochasticRouting, Validate,
};
use crate::property::{CompileReport, Layout, PropertySet};

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Names of the passes, in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes on the given circuit.
    ///
    /// The report in `properties` gets one snapshot per executed pass. The
    /// first failing pass aborts the run.
    #[instrument(skip(self, circuit, properties), fields(circuit = %circuit.name()))]
    pub fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        info!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.passes.len(),
            circuit.num_qubits()
        );

        let mut circuit = circuit;
        for pass in &self.passes {
            if pass.should_run(&circuit, properties) {
                debug!("Running pass: {}", pass.name());
                circuit = pass.run(circuit, properties)?;
                properties.report.record(pass.stage(), &circuit);
                debug!("Pass {} completed, ops: {}", pass.name(), circuit.len());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!(
            "Pass manager completed, final depth: {}, ops: {}",
            circuit.depth(),
            circuit.len()
        );
        Ok(circuit)
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled circuit together with how it was placed on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledCircuit {
    /// The circuit over physical qubits, in the native basis.
    pub circuit: Circuit,
    /// Layout before routing.
    pub initial_layout: Layout,
    /// Layout after routing; use this to locate virtual qubits at measure time.
    pub final_layout: Layout,
    /// What the pipeline did.
    pub report: CompileReport,
}

impl CompiledCircuit {
    /// Wrap a circuit that was never compiled: qubit `v` is physical qubit `v`.
    pub fn unmapped(circuit: Circuit) -> Self {
        let n = circuit.num_qubits();
        let mut report = CompileReport {
            skipped: true,
            ..CompileReport::default()
        };
        report.record(Stage::Finalized, &circuit);
        Self {
            circuit,
            initial_layout: Layout::trivial(n, n),
            final_layout: Layout::trivial(n, n),
            report,
        }
    }

    /// Physical qubit holding virtual qubit `v` at the end of the circuit.
    pub fn physical_qubit(&self, v: QubitId) -> Option<u32> {
        self.final_layout.physical(v)
    }
}

/// Compilation pipeline for one device and one configuration.
///
/// The pipeline owns its pass sequence and shares the device read-only, so a
/// single instance can compile many circuits, including in parallel.
///
/// ```rust
/// use std::sync::Arc;
/// use qpipe_compile::{BasisGates, CouplingMap, Device, Pipeline, PipelineConfig};
/// use qpipe_ir::Circuit;
///
/// let device = Device::new("line", BasisGates::ibm(), CouplingMap::linear(3));
/// let pipeline = Pipeline::new(Arc::new(device), PipelineConfig::default()).unwrap();
/// let compiled = pipeline.compile(&Circuit::bell().unwrap()).unwrap();
/// assert!(compiled.circuit.ops().iter().all(|op| {
///     op.is_measure() || ["rz", "sx", "x", "cx"].contains(&op.name())
/// }));
/// ```
pub struct Pipeline {
    device: Arc<Device>,
    config: PipelineConfig,
    manager: PassManager,
}

impl Pipeline {
    /// Build the pass sequence the configuration selects.
    pub fn new(device: Arc<Device>, config: PipelineConfig) -> CompileResult<Self> {
        config.validate()?;
        let policy = config.optimization_level.policy();
        let library = Arc::new(EquivalenceLibrary::standard());
        let translator = Arc::new(BasisTranslator::new((*library).clone(), &device));

        let mut manager = PassManager::new();
        manager.add_pass(Validate::new(library));

        let layout = LayoutSelection::new(config.layout_method(), policy);
        match &config.layout {
            Some(LayoutOverride::Mapping(mapping)) => {
                manager.add_pass(layout.with_mapping(mapping.clone()));
            }
            _ => manager.add_pass(layout),
        }

        match config.routing_method() {
            RoutingMethod::Sabre => manager.add_pass(SabreRouting::new(
                policy.lookahead_size,
                policy.lookahead_weight,
                config.routing_iteration_factor,
            )),
            RoutingMethod::Stochastic => manager.add_pass(StochasticRouting::new(
                policy.stochastic_trials,
                config.seed,
                config.routing_iteration_factor,
            )),
        }

        manager.add_pass(BasisTranslation::new(translator.clone()));
        if policy.optimize {
            manager.add_pass(LocalOptimization::new(translator.clone()));
        }
        if policy.dynamical_decoupling {
            manager.add_pass(DynamicalDecoupling::new(translator));
        }

        info!(
            "Built pipeline for '{}' at {} ({} policy): {:?}",
            device.name(),
            config.optimization_level,
            policy.name,
            manager.pass_names()
        );
        Ok(Self {
            device,
            config,
            manager,
        })
    }

    /// The target device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The configuration this pipeline was built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The underlying pass sequence.
    pub fn pass_manager(&self) -> &PassManager {
        &self.manager
    }

    /// Compile one circuit.
    pub fn compile(&self, circuit: &Circuit) -> CompileResult<CompiledCircuit> {
        if self.config.skip_compilation {
            return self.bypass(circuit);
        }

        let mut props = PropertySet::new(self.device.clone());
        props.approximation_degree = self.config.approximation_degree;
        props.strictness = self.config.strictness;

        let compiled = self.manager.run(circuit.clone(), &mut props)?;
        props.report.record(Stage::Finalized, &compiled);

        let initial_layout = props
            .layout
            .unwrap_or_else(|| Layout::trivial(circuit.num_qubits(), self.device.num_qubits()));
        let final_layout = props.final_layout.unwrap_or_else(|| initial_layout.clone());
        Ok(CompiledCircuit {
            circuit: compiled,
            initial_layout,
            final_layout,
            report: props.report,
        })
    }

    /// Compile independent circuits in parallel; results keep input order.
    pub fn compile_batch(&self, circuits: &[Circuit]) -> Vec<CompileResult<CompiledCircuit>> {
        info!("Compiling batch of {} circuits", circuits.len());
        circuits.par_iter().map(|c| self.compile(c)).collect()
    }

    /// Pass the circuit through after the minimal checks the strictness asks for.
    fn bypass(&self, circuit: &Circuit) -> CompileResult<CompiledCircuit> {
        let nv = circuit.num_qubits();
        let np = self.device.num_qubits();
        if nv > np {
            return Err(CompileError::InsufficientQubits {
                stage: Stage::Validated,
                required: nv,
                available: np,
                detail: format!("device '{}' is too small", self.device.name()),
            });
        }

        if self.config.strictness == Strictness::Strict {
            for (idx, op) in circuit.ops().iter().enumerate() {
                let Some(gate) = op.as_gate() else {
                    continue;
                };
                if !self.device.is_native_gate(gate.name()) {
                    return Err(CompileError::UnsupportedGate {
                        op_index: idx,
                        gate: gate.name().to_string(),
                        stage: Stage::Validated,
                    });
                }
                for (i, a) in op.qubits.iter().enumerate() {
                    for b in &op.qubits[i + 1..] {
                        if !self.device.are_connected(a.0, b.0) {
                            return Err(CompileError::ConnectivityViolation {
                                op_index: idx,
                                qubit1: a.0,
                                qubit2: b.0,
                            });
                        }
                    }
                }
            }
        }

        debug!("Compilation skipped for '{}'", circuit.name());
        let mut report = CompileReport {
            skipped: true,
            ..CompileReport::default()
        };
        report.record(Stage::Finalized, circuit);
        Ok(CompiledCircuit {
            circuit: circuit.clone(),
            initial_layout: Layout::trivial(nv, np),
            final_layout: Layout::trivial(nv, np),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BasisGates, CouplingMap};

    fn line(n: u32) -> Arc<Device> {
        Arc::new(Device::new("line", BasisGates::ibm(), CouplingMap::linear(n)))
    }

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn test_pass_manager_run() {
        let pm = PassManager::new();
        let mut props = PropertySet::new(line(2));
        let circuit = Circuit::bell().unwrap();
        let out = pm.run(circuit.clone(), &mut props).unwrap();
        assert_eq!(out, circuit);
        assert!(props.report.stages.is_empty());
    }

    #[test]
    fn test_level_selects_passes() {
        let level0 = PipelineConfig::default().with_optimization_level(0).unwrap();
        let pipeline = Pipeline::new(line(3), level0).unwrap();
        assert_eq!(
            pipeline.pass_manager().pass_names(),
            ["Validate", "LayoutSelection", "StochasticRouting", "BasisTranslation"]
        );

        let pipeline = Pipeline::new(line(3), PipelineConfig::default()).unwrap();
        assert_eq!(
            pipeline.pass_manager().pass_names(),
            [
                "Validate",
                "LayoutSelection",
                "SabreRouting",
                "BasisTranslation",
                "LocalOptimization",
                "DynamicalDecoupling"
            ]
        );
    }

    #[test]
    fn test_invalid_approximation_rejected() {
        let config = PipelineConfig::default().with_approximation_degree(1.5);
        assert!(matches!(
            Pipeline::new(line(2), config),
            Err(CompileError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_report_stages_in_order() {
        let pipeline = Pipeline::new(line(3), PipelineConfig::default()).unwrap();
        let compiled = pipeline.compile(&Circuit::ghz(3).unwrap()).unwrap();
        let stages: Vec<Stage> = compiled.report.stages.iter().map(|s| s.stage).collect();
        // No durations on the device, so decoupling is skipped.
        assert_eq!(
            stages,
            [
                Stage::Validated,
                Stage::LayoutChosen,
                Stage::Routed,
                Stage::Translated,
                Stage::LocallyOptimized,
                Stage::Finalized
            ]
        );
        assert!(!compiled.report.skipped);
    }

    #[test]
    fn test_bypass_strict_rejects_non_native() {
        let config = PipelineConfig::default()
            .with_skip_compilation(true)
            .with_strictness(Strictness::Strict);
        let pipeline = Pipeline::new(line(2), config).unwrap();
        let err = pipeline.compile(&Circuit::bell().unwrap()).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedGate {
                op_index: 0,
                gate: "h".into(),
                stage: Stage::Validated,
            }
        );
    }

    #[test]
    fn test_bypass_lenient_only_checks_width() {
        let config = PipelineConfig::default().with_skip_compilation(true);
        let pipeline = Pipeline::new(line(2), config).unwrap();
        let bell = Circuit::bell().unwrap();
        let compiled = pipeline.compile(&bell).unwrap();
        assert_eq!(compiled.circuit, bell);
        assert!(compiled.report.skipped);

        let err = pipeline.compile(&Circuit::ghz(3).unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::InsufficientQubits { .. }));
    }
}
