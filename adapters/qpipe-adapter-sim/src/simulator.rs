//! Simulator backend implementation.

use std::time::Instant;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use tracing::{debug, instrument};

use qpipe_hal::{Backend, Capabilities, Counts, ExecutionResult, HalError, HalResult};
use qpipe_ir::{Circuit, InstructionKind};

use crate::statevector::Statevector;

/// Default qubit limit; 2^24 amplitudes is 256 MiB.
pub const DEFAULT_MAX_QUBITS: u32 = 24;

/// Local simulator backend.
///
/// Circuits whose measurements all come last are simulated once and sampled
/// `shots` times. Circuits with a gate after a measurement on the same qubit
/// are re-simulated per shot with state collapse.
pub struct SimulatorBackend {
    capabilities: Capabilities,
    seed: Option<u64>,
}

impl SimulatorBackend {
    /// Create a new simulator backend with default settings.
    pub fn new() -> Self {
        Self::with_max_qubits(DEFAULT_MAX_QUBITS)
    }

    /// Create a simulator with custom max qubits.
    pub fn with_max_qubits(max_qubits: u32) -> Self {
        Self {
            capabilities: Capabilities::simulator(max_qubits),
            seed: None,
        }
    }

    /// Make sampling reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn check(&self, circuit: &Circuit, shots: u32) -> HalResult<()> {
        if circuit.num_qubits() > self.capabilities.num_qubits {
            return Err(HalError::CircuitTooLarge(format!(
                "Circuit has {} qubits but simulator only supports {}",
                circuit.num_qubits(),
                self.capabilities.num_qubits
            )));
        }
        if shots == 0 || shots > self.capabilities.max_shots {
            return Err(HalError::InvalidShots(format!(
                "{shots} outside 1..={}",
                self.capabilities.max_shots
            )));
        }
        Ok(())
    }
}

impl Default for SimulatorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.capabilities.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[instrument(skip(self, circuit), fields(circuit = %circuit.name()))]
    async fn execute(&self, circuit: &Circuit, shots: u32) -> HalResult<ExecutionResult> {
        self.check(circuit, shots)?;
        let circuit = circuit.clone();
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        tokio::task::spawn_blocking(move || run_simulation(&circuit, shots, rng))
            .await
            .map_err(|e| HalError::Backend(format!("simulation task failed: {e}")))?
    }
}

/// Run simulation synchronously.
fn run_simulation(circuit: &Circuit, shots: u32, mut rng: SmallRng) -> HalResult<ExecutionResult> {
    let start = Instant::now();
    debug!(
        "Starting simulation: {} qubits, {} shots",
        circuit.num_qubits(),
        shots
    );

    let counts = if has_mid_circuit_measurement(circuit) {
        debug!("Mid-circuit measurement present, simulating per shot");
        let mut counts = Counts::new();
        for _ in 0..shots {
            counts.add(run_shot(circuit, &mut rng)?, 1);
        }
        counts
    } else {
        sample_final_state(circuit, shots, &mut rng)?
    };

    let elapsed = start.elapsed();
    debug!("Simulation completed in {:?}", elapsed);
    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    Ok(ExecutionResult::new(counts, shots).with_execution_time_ms(ms))
}

/// True if some qubit is acted on after it was measured.
fn has_mid_circuit_measurement(circuit: &Circuit) -> bool {
    let mut measured = vec![false; circuit.num_qubits() as usize];
    for op in circuit.ops() {
        match op.kind {
            InstructionKind::Measure => measured[op.qubits[0].index()] = true,
            InstructionKind::Gate { .. } => {
                if op.qubits.iter().any(|q| measured[q.index()]) {
                    return true;
                }
            }
            InstructionKind::Barrier | InstructionKind::Delay { .. } => {}
        }
    }
    false
}

/// Format classical bits with clbit 0 rightmost.
fn bitstring(clbits: &[bool]) -> String {
    clbits
        .iter()
        .rev()
        .map(|&b| if b { '1' } else { '0' })
        .collect()
}

fn sample_final_state(circuit: &Circuit, shots: u32, rng: &mut SmallRng) -> HalResult<Counts> {
    let mut sv = Statevector::new(circuit.num_qubits() as usize);
    // Last measurement into each clbit wins.
    let mut readout: Vec<Option<usize>> = vec![None; circuit.num_clbits() as usize];
    for (idx, op) in circuit.ops().iter().enumerate() {
        if op.is_measure() {
            readout[op.clbits[0].index()] = Some(op.qubits[0].index());
        } else {
            sv.apply(idx, op)?;
        }
    }

    let dist = WeightedIndex::new(sv.probabilities())
        .map_err(|e| HalError::Backend(format!("degenerate state: {e}")))?;
    let mut counts = Counts::new();
    let mut clbits = vec![false; readout.len()];
    for _ in 0..shots {
        let outcome = dist.sample(rng);
        for (bit, qubit) in clbits.iter_mut().zip(&readout) {
            *bit = qubit.is_some_and(|q| outcome & (1 << q) != 0);
        }
        counts.add(bitstring(&clbits), 1);
    }
    Ok(counts)
}

fn run_shot(circuit: &Circuit, rng: &mut SmallRng) -> HalResult<String> {
    let mut sv = Statevector::new(circuit.num_qubits() as usize);
    let mut clbits = vec![false; circuit.num_clbits() as usize];
    for (idx, op) in circuit.ops().iter().enumerate() {
        if op.is_measure() {
            clbits[op.clbits[0].index()] = sv.measure(op.qubits[0].index(), rng);
        } else {
            sv.apply(idx, op)?;
        }
    }
    Ok(bitstring(&clbits))
}
