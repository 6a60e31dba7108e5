//! Expectation mode.
//!
//! Each (circuit, observable) pair is estimated by running one measurement
//! circuit per qubit-wise commuting group of the observable's terms:
//!
//! ```text
//!   circuit ops (measurements dropped)
//!     → basis change per measured qubit (X: h, Y: sdg h, Z: none)
//!     → measure into fresh classical bits
//! ```
//!
//! Observables are written over virtual qubits. The circuit's final layout
//! tells where each virtual qubit ended up, so compiled circuits can be
//! passed as they come out of the pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use qpipe_compile::{BasisTranslator, CompileError, CompiledCircuit, Device, EquivalenceLibrary, Stage};
use qpipe_hal::{Backend, Counts, HalError};
use qpipe_ir::{Circuit, ClbitId, Instruction, ParameterBindings, QubitId, StandardGate};

use crate::cancel::CancellationToken;
use crate::dispatch::Dispatcher;
use crate::error::{PrimitiveError, PrimitiveResult};
use crate::observable::{MeasurementGroup, Observable, Pauli};
use crate::sampler::DEFAULT_SHOTS;

/// Estimates expectation values of observables.
pub struct Estimator {
    dispatcher: Dispatcher,
    translator: Option<BasisTranslator>,
}

impl Estimator {
    /// Estimate on `backend` with [`DEFAULT_SHOTS`] per measurement circuit.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            dispatcher: Dispatcher {
                backend,
                shots: DEFAULT_SHOTS,
                timeout: None,
            },
            translator: None,
        }
    }

    /// Set the shots per measurement circuit.
    #[must_use]
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.dispatcher.shots = shots;
        self
    }

    /// Give up on any single measurement circuit after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.timeout = Some(timeout);
        self
    }

    /// Express basis-change gates in `device`'s native basis.
    #[must_use]
    pub fn with_device(mut self, device: &Device) -> Self {
        self.translator = Some(BasisTranslator::new(EquivalenceLibrary::standard(), device));
        self
    }

    /// Estimate `observables[i]` on `circuits[i]`.
    ///
    /// `bindings` is either empty or has one entry per circuit. Mismatched
    /// lengths reject the call; everything else is reported per index.
    pub async fn run(
        &self,
        circuits: &[CompiledCircuit],
        observables: &[Observable],
        bindings: &[ParameterBindings],
    ) -> PrimitiveResult<Vec<PrimitiveResult<f64>>> {
        self.run_cancellable(circuits, observables, bindings, &CancellationToken::new())
            .await
    }

    /// [`run`](Self::run), abandoning pending work once `cancel` fires.
    #[instrument(skip_all, fields(circuits = circuits.len(), shots = self.dispatcher.shots))]
    pub async fn run_cancellable(
        &self,
        circuits: &[CompiledCircuit],
        observables: &[Observable],
        bindings: &[ParameterBindings],
        cancel: &CancellationToken,
    ) -> PrimitiveResult<Vec<PrimitiveResult<f64>>> {
        if self.dispatcher.shots == 0 {
            return Err(PrimitiveError::InvalidShots);
        }
        if observables.len() != circuits.len() {
            return Err(PrimitiveError::ShapeMismatch {
                what: "observables",
                expected: circuits.len(),
                actual: observables.len(),
            });
        }
        if !bindings.is_empty() && bindings.len() != circuits.len() {
            return Err(PrimitiveError::ShapeMismatch {
                what: "parameter bindings",
                expected: circuits.len(),
                actual: bindings.len(),
            });
        }
        info!(
            "Estimating {} observables on {}",
            circuits.len(),
            self.dispatcher.backend.name()
        );

        let tasks = circuits
            .iter()
            .zip(observables)
            .enumerate()
            .map(|(index, (compiled, observable))| {
                self.estimate(index, compiled, observable, bindings.get(index), cancel)
            });
        Ok(join_all(tasks).await)
    }

    async fn estimate(
        &self,
        index: usize,
        compiled: &CompiledCircuit,
        observable: &Observable,
        bindings: Option<&ParameterBindings>,
        cancel: &CancellationToken,
    ) -> PrimitiveResult<f64> {
        let circuit = match bindings {
            Some(b) => compiled.circuit.bind_parameters(b),
            None => compiled.circuit.clone(),
        };
        if circuit.is_parameterized() {
            return Err(PrimitiveError::UnboundParameter {
                index,
                names: circuit.parameter_names(),
            });
        }
        let num_virtual = compiled.final_layout.num_virtual();
        if observable.width() as usize > num_virtual {
            return Err(PrimitiveError::InvalidObservable(format!(
                "observable {index} acts on {} qubits, circuit has {num_virtual}",
                observable.width()
            )));
        }

        let mut value = observable.constant();
        for (g, group) in observable.groups().iter().enumerate() {
            let (measured, clbit_of) = self.measurement_circuit(index, g, &circuit, compiled, group)?;
            let counts = self.dispatcher.execute(index, &measured, cancel).await?;
            for &t in &group.terms {
                let term = &observable.terms()[t];
                let clbits: Vec<usize> = term
                    .paulis
                    .keys()
                    .filter_map(|q| clbit_of.get(q).copied())
                    .collect();
                value += term.coeff * parity_expectation(index, &counts, &clbits)?;
            }
        }
        debug!("Observable {index} estimated at {value}");
        Ok(value)
    }

    /// Build the circuit measuring one group, and where each virtual qubit
    /// was read out.
    fn measurement_circuit(
        &self,
        index: usize,
        group_index: usize,
        circuit: &Circuit,
        compiled: &CompiledCircuit,
        group: &MeasurementGroup,
    ) -> PrimitiveResult<(Circuit, FxHashMap<u32, usize>)> {
        let mut ops: Vec<Instruction> = circuit
            .ops()
            .iter()
            .filter(|op| !op.is_measure())
            .cloned()
            .collect();
        let base = circuit.num_clbits() as usize;
        let mut clbit_of = FxHashMap::default();

        for (k, (&v, &pauli)) in group.basis.iter().enumerate() {
            let physical = compiled.physical_qubit(QubitId(v)).ok_or_else(|| {
                PrimitiveError::InvalidObservable(format!("virtual qubit {v} is not placed"))
            })?;
            let q = QubitId(physical);
            let change: &[StandardGate] = match pauli {
                Pauli::X => &[StandardGate::H],
                Pauli::Y => &[StandardGate::Sdg, StandardGate::H],
                Pauli::Z | Pauli::I => &[],
            };
            for gate in change {
                match &self.translator {
                    Some(translator) => {
                        let native = translator.translate(gate, &[q], 0.0).ok_or_else(|| {
                            PrimitiveError::Compile {
                                index,
                                source: CompileError::UnsupportedGate {
                                    op_index: ops.len(),
                                    gate: gate.name().to_string(),
                                    stage: Stage::Translated,
                                },
                            }
                        })?;
                        ops.extend(native);
                    }
                    None => ops.push(Instruction::single_qubit_gate(gate.clone(), q)),
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            ops.push(Instruction::measure(q, ClbitId((base + k) as u32)));
            clbit_of.insert(v, base + k);
        }

        #[allow(clippy::cast_possible_truncation)]
        let num_clbits = (base + group.basis.len()) as u32;
        let measured = Circuit::from_ops(
            format!("{}_group{group_index}", circuit.name()),
            circuit.num_qubits(),
            num_clbits,
            ops,
        )
        .map_err(|source| PrimitiveError::Ir { index, source })?;
        Ok((measured, clbit_of))
    }
}

/// Mean of (-1)^(parity of `clbits`) over the observed shots.
fn parity_expectation(index: usize, counts: &Counts, clbits: &[usize]) -> PrimitiveResult<f64> {
    let total = counts.total_shots();
    if total == 0 {
        return Err(PrimitiveError::Backend {
            index,
            source: HalError::JobFailed("backend returned no counts".into()),
        });
    }
    let mut acc: i64 = 0;
    for (bits, &n) in counts.iter() {
        let bytes = bits.as_bytes();
        let ones = clbits
            .iter()
            .filter(|&&c| c < bytes.len() && bytes[bytes.len() - 1 - c] == b'1')
            .count();
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        if ones % 2 == 0 {
            acc += n;
        } else {
            acc -= n;
        }
    }
    Ok(acc as f64 / total as f64)
}
