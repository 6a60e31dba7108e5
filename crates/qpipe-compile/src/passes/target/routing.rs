//! Routing passes for inserting SWAP gates.
//!
//! Both routers take a circuit over virtual qubits plus the initial layout
//! from the property set, and emit a circuit over the device's physical
//! qubits in which every two-qubit gate acts on a connected pair. The layout
//! after the last swap is stored as the final layout.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use tracing::{debug, info};

use qpipe_ir::{Circuit, Instruction, QubitId, StandardGate};

use crate::device::Device;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, Stage};
use crate::property::{Layout, PropertySet};

/// Decay added to a qubit each time a swap touches it.
const DECAY_RATE: f64 = 0.001;

/// Swaps between decay resets.
const DECAY_RESET_INTERVAL: usize = 5;

/// Upcoming two-qubit gates scored by stochastic trials.
const STOCHASTIC_LOOKAHEAD: usize = 10;

/// Result of routing one circuit.
#[derive(Debug, Clone)]
pub struct RoutingOutcome {
    /// Operations over physical qubits.
    pub ops: Vec<Instruction>,
    /// Index in the routed circuit of each output op; `None` for swaps.
    pub origins: Vec<Option<usize>>,
    /// Layout after the last swap.
    pub final_layout: Layout,
    /// Swaps inserted.
    pub swaps: usize,
    /// Times the release valve fired.
    pub release_valve_activations: usize,
}

/// Parameters for the look-ahead router.
#[derive(Debug, Clone, Copy)]
pub struct SabreParams {
    /// Two-qubit gates in the extended set.
    pub lookahead_size: usize,
    /// Weight of the extended-set term.
    pub lookahead_weight: f64,
    /// Maximum swaps before giving up.
    pub iteration_limit: usize,
}

fn check_layout(circuit: &Circuit, device: &Device, layout: &Layout) -> CompileResult<()> {
    if layout.num_virtual() != circuit.num_qubits() as usize
        || layout.num_physical() != device.num_qubits() as usize
    {
        return Err(CompileError::InsufficientQubits {
            stage: Stage::Routed,
            required: circuit.num_qubits(),
            available: device.num_qubits(),
            detail: format!(
                "layout maps {} of {} virtual qubits onto {} physical",
                layout.num_virtual(),
                circuit.num_qubits(),
                layout.num_physical()
            ),
        });
    }
    Ok(())
}

fn physical_pair(op: &Instruction, layout: &Layout) -> (u32, u32) {
    let p = |q: QubitId| layout.physical(q).unwrap_or(q.0);
    (p(op.qubits[0]), p(op.qubits[1]))
}

fn to_physical(op: &Instruction, layout: &Layout) -> Instruction {
    op.remap_qubits(|q| QubitId(layout.physical(q).unwrap_or(q.0)))
}

fn swap_op(a: u32, b: u32) -> Instruction {
    Instruction::two_qubit_gate(StandardGate::Swap, QubitId(a), QubitId(b))
}

fn distance(device: &Device, a: u32, b: u32) -> CompileResult<u32> {
    device.distance(a, b).ok_or(CompileError::RoutingFailed {
        qubit1: a,
        qubit2: b,
    })
}

/// Look-ahead swap router.
///
/// Keeps a front layer of operations whose predecessors have all run.
/// Executable operations are committed immediately; when every front gate
/// is blocked, each swap touching a front-gate qubit is scored by the
/// distance it leaves over the front layer plus a weighted look-ahead
/// window, scaled by a per-qubit decay that discourages thrashing. Ties go
/// to the lowest physical pair.
pub fn sabre_route(
    circuit: &Circuit,
    device: &Device,
    layout: Layout,
    params: &SabreParams,
) -> CompileResult<RoutingOutcome> {
    check_layout(circuit, device, &layout)?;

    let dag = circuit.to_dag();
    let ops = circuit.ops();
    let num_physical = device.num_qubits() as usize;
    let mut layout = layout;

    let mut pending: Vec<usize> = (0..ops.len()).map(|i| dag.predecessors(i).len()).collect();
    let mut front: Vec<usize> = dag.front_layer();
    let mut out = Vec::with_capacity(ops.len());
    let mut origins = Vec::with_capacity(ops.len());

    let mut decay = vec![1.0f64; num_physical];
    let mut swaps = 0usize;
    let mut swaps_since_progress = 0usize;
    let mut release_valve = 0usize;

    while !front.is_empty() {
        // Commit everything executable, repeatedly, until the front is blocked.
        let mut progressed = false;
        loop {
            let mut next_front = Vec::with_capacity(front.len());
            let mut executed = Vec::new();
            for &idx in &front {
                let op = &ops[idx];
                let ready = !op.is_two_qubit_gate() || {
                    let (a, b) = physical_pair(op, &layout);
                    device.are_connected(a, b)
                };
                if ready {
                    out.push(to_physical(op, &layout));
                    origins.push(Some(idx));
                    executed.push(idx);
                } else {
                    next_front.push(idx);
                }
            }
            if executed.is_empty() {
                break;
            }
            progressed = true;
            for idx in executed {
                for succ in dag.successors(idx) {
                    pending[succ] -= 1;
                    if pending[succ] == 0 {
                        next_front.push(succ);
                    }
                }
            }
            next_front.sort_unstable();
            front = next_front;
        }

        if progressed {
            decay.iter_mut().for_each(|d| *d = 1.0);
            swaps_since_progress = 0;
            continue;
        }
        if front.is_empty() {
            break;
        }

        if swaps >= params.iteration_limit {
            return Err(CompileError::RoutingTimeout {
                iterations: swaps,
                limit: params.iteration_limit,
            });
        }

        if swaps_since_progress >= 2 * num_physical {
            // Release valve: walk the closest blocked gate together.
            let mut closest: Option<(u32, usize)> = None;
            for &idx in &front {
                let (a, b) = physical_pair(&ops[idx], &layout);
                let d = distance(device, a, b)?;
                if closest.is_none_or(|(best, _)| d < best) {
                    closest = Some((d, idx));
                }
            }
            if let Some((_, idx)) = closest {
                let (a, b) = physical_pair(&ops[idx], &layout);
                let path = device
                    .shortest_path(a, b)
                    .ok_or(CompileError::RoutingFailed { qubit1: a, qubit2: b })?;
                for w in path.windows(2).take(path.len().saturating_sub(2)) {
                    out.push(swap_op(w[0], w[1]));
                    origins.push(None);
                    layout.swap_physical(w[0], w[1]);
                    swaps += 1;
                }
                release_valve += 1;
                swaps_since_progress = 0;
                debug!("Release valve routed op {} along {:?}", idx, path);
            }
            continue;
        }

        let extended = extended_set(circuit, &dag, &front, &pending, params.lookahead_size);

        let mut candidates: BTreeSet<(u32, u32)> = BTreeSet::new();
        for &idx in &front {
            for &q in &ops[idx].qubits {
                let p = layout.physical(q).unwrap_or(q.0);
                for &n in device.neighbors(p) {
                    candidates.insert((p.min(n), p.max(n)));
                }
            }
        }

        let mut best: Option<(f64, (u32, u32))> = None;
        for &(a, b) in &candidates {
            let mut trial = layout.clone();
            trial.swap_physical(a, b);
            let front_cost = layer_cost(ops, &front, &trial, device)?;
            let mut score = front_cost / front.len() as f64;
            if !extended.is_empty() {
                let ext_cost = layer_cost(ops, &extended, &trial, device)?;
                score += params.lookahead_weight * ext_cost / extended.len() as f64;
            }
            score *= decay[a as usize].max(decay[b as usize]);
            if best.is_none_or(|(s, _)| score < s) {
                best = Some((score, (a, b)));
            }
        }

        let Some((_, (a, b))) = best else {
            // A blocked gate with no neighbours means disconnected qubits.
            let (a, b) = physical_pair(&ops[front[0]], &layout);
            return Err(CompileError::RoutingFailed { qubit1: a, qubit2: b });
        };

        out.push(swap_op(a, b));
        origins.push(None);
        layout.swap_physical(a, b);
        swaps += 1;
        swaps_since_progress += 1;
        decay[a as usize] += DECAY_RATE;
        decay[b as usize] += DECAY_RATE;
        if swaps % DECAY_RESET_INTERVAL == 0 {
            decay.iter_mut().for_each(|d| *d = 1.0);
        }
    }

    Ok(RoutingOutcome {
        ops: out,
        origins,
        final_layout: layout,
        swaps,
        release_valve_activations: release_valve,
    })
}

/// Two-qubit gates just beyond the front layer, breadth first.
fn extended_set(
    circuit: &Circuit,
    dag: &qpipe_ir::CircuitDag,
    front: &[usize],
    pending: &[usize],
    size: usize,
) -> Vec<usize> {
    if size == 0 {
        return vec![];
    }
    let ops = circuit.ops();
    let mut remaining = pending.to_vec();
    let mut queue: std::collections::VecDeque<usize> = front.iter().copied().collect();
    let mut out = Vec::new();
    while let Some(idx) = queue.pop_front() {
        for succ in dag.successors(idx) {
            remaining[succ] = remaining[succ].saturating_sub(1);
            if remaining[succ] == 0 {
                if ops[succ].is_two_qubit_gate() {
                    out.push(succ);
                    if out.len() >= size {
                        return out;
                    }
                }
                queue.push_back(succ);
            }
        }
    }
    out
}

fn layer_cost(ops: &[Instruction], layer: &[usize], layout: &Layout, device: &Device) -> CompileResult<f64> {
    let mut total = 0.0;
    for &idx in layer {
        if ops[idx].is_two_qubit_gate() {
            let (a, b) = physical_pair(&ops[idx], layout);
            total += f64::from(distance(device, a, b)?);
        }
    }
    Ok(total)
}

/// Randomised shortest-path router.
///
/// Walks the circuit in order. At each blocked two-qubit gate it runs
/// `trials` random walks that bring the operands together, each step
/// choosing among distance-reducing swaps weighted by edge quality, and
/// keeps the walk that leaves the next few two-qubit gates closest.
pub fn stochastic_route(
    circuit: &Circuit,
    device: &Device,
    layout: Layout,
    trials: usize,
    seed: u64,
    iteration_limit: usize,
) -> CompileResult<RoutingOutcome> {
    check_layout(circuit, device, &layout)?;

    let ops = circuit.ops();
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut layout = layout;
    let mut out = Vec::with_capacity(ops.len());
    let mut origins = Vec::with_capacity(ops.len());
    let mut swaps = 0usize;

    for (idx, op) in ops.iter().enumerate() {
        if op.is_two_qubit_gate() {
            let (a, b) = physical_pair(op, &layout);
            if !device.are_connected(a, b) {
                distance(device, a, b)?;
                let upcoming: Vec<usize> = ops[idx + 1..]
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.is_two_qubit_gate())
                    .map(|(k, _)| idx + 1 + k)
                    .take(STOCHASTIC_LOOKAHEAD)
                    .collect();

                let mut best: Option<(f64, Vec<(u32, u32)>, Layout)> = None;
                for _ in 0..trials.max(1) {
                    let (walk, trial) = random_walk(op, &layout, device, &mut rng)?;
                    let cost = layer_cost(ops, &upcoming, &trial, device)?;
                    if best.as_ref().is_none_or(|(c, _, _)| cost < *c) {
                        best = Some((cost, walk, trial));
                    }
                }
                if let Some((_, walk, trial)) = best {
                    if swaps + walk.len() > iteration_limit {
                        return Err(CompileError::RoutingTimeout {
                            iterations: swaps + walk.len(),
                            limit: iteration_limit,
                        });
                    }
                    swaps += walk.len();
                    out.extend(walk.iter().map(|&(p, q)| swap_op(p, q)));
                    origins.extend(std::iter::repeat_n(None, walk.len()));
                    layout = trial;
                }
            }
        }
        out.push(to_physical(op, &layout));
        origins.push(Some(idx));
    }

    Ok(RoutingOutcome {
        ops: out,
        origins,
        final_layout: layout,
        swaps,
        release_valve_activations: 0,
    })
}

fn random_walk(
    op: &Instruction,
    layout: &Layout,
    device: &Device,
    rng: &mut SmallRng,
) -> CompileResult<(Vec<(u32, u32)>, Layout)> {
    let mut trial = layout.clone();
    let mut walk = Vec::new();
    loop {
        let (a, b) = physical_pair(op, &trial);
        let d = distance(device, a, b)?;
        if d <= 1 {
            return Ok((walk, trial));
        }
        let mut moves: Vec<(u32, u32)> = Vec::new();
        for (from, other) in [(a, b), (b, a)] {
            for &n in device.neighbors(from) {
                if device.distance(n, other).is_some_and(|nd| nd < d) {
                    moves.push((from, n));
                }
            }
        }
        let weights: Vec<f64> = moves
            .iter()
            .map(|&(p, q)| 1.0 / (1.0 + 10.0 * device.edge_error(p, q).unwrap_or(0.0)))
            .collect();
        let dist = WeightedIndex::new(&weights)
            .map_err(|_| CompileError::RoutingFailed { qubit1: a, qubit2: b })?;
        let (p, q) = moves[dist.sample(rng)];
        trial.swap_physical(p, q);
        walk.push((p.min(q), p.max(q)));
    }
}

/// Look-ahead (sabre) routing pass.
pub struct SabreRouting {
    lookahead_size: usize,
    lookahead_weight: f64,
    iteration_factor: usize,
}

impl SabreRouting {
    /// Create the pass.
    pub fn new(lookahead_size: usize, lookahead_weight: f64, iteration_factor: usize) -> Self {
        Self {
            lookahead_size,
            lookahead_weight,
            iteration_factor,
        }
    }
}

impl Pass for SabreRouting {
    fn name(&self) -> &'static str {
        "SabreRouting"
    }

    fn stage(&self) -> Stage {
        Stage::Routed
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let layout = initial_layout(&circuit, properties)?;
        let params = SabreParams {
            lookahead_size: self.lookahead_size,
            lookahead_weight: self.lookahead_weight,
            iteration_limit: iteration_limit(&circuit, self.iteration_factor),
        };
        let outcome = sabre_route(&circuit, &properties.device, layout, &params)?;
        finish(&circuit, outcome, properties)
    }
}

/// Stochastic routing pass.
pub struct StochasticRouting {
    trials: usize,
    seed: u64,
    iteration_factor: usize,
}

impl StochasticRouting {
    /// Create the pass.
    pub fn new(trials: usize, seed: u64, iteration_factor: usize) -> Self {
        Self {
            trials,
            seed,
            iteration_factor,
        }
    }
}

impl Pass for StochasticRouting {
    fn name(&self) -> &'static str {
        "StochasticRouting"
    }

    fn stage(&self) -> Stage {
        Stage::Routed
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let layout = initial_layout(&circuit, properties)?;
        let outcome = stochastic_route(
            &circuit,
            &properties.device,
            layout,
            self.trials,
            self.seed,
            iteration_limit(&circuit, self.iteration_factor),
        )?;
        finish(&circuit, outcome, properties)
    }
}

fn iteration_limit(circuit: &Circuit, factor: usize) -> usize {
    (circuit.len() + 1).saturating_mul(factor)
}

fn initial_layout(circuit: &Circuit, properties: &PropertySet) -> CompileResult<Layout> {
    properties
        .layout
        .clone()
        .ok_or_else(|| CompileError::InsufficientQubits {
            stage: Stage::Routed,
            required: circuit.num_qubits(),
            available: properties.device.num_qubits(),
            detail: "no initial layout selected".into(),
        })
}

fn finish(
    circuit: &Circuit,
    outcome: RoutingOutcome,
    properties: &mut PropertySet,
) -> CompileResult<Circuit> {
    info!(
        "Routing inserted {} swaps ({} release-valve activations)",
        outcome.swaps, outcome.release_valve_activations
    );
    properties.report.swaps_inserted += outcome.swaps;
    properties.report.release_valve_activations += outcome.release_valve_activations;
    properties.remap_origins(&outcome.origins);
    properties.final_layout = Some(outcome.final_layout);
    Ok(Circuit::from_ops(
        circuit.name(),
        properties.device.num_qubits(),
        circuit.num_clbits(),
        outcome.ops,
    )?)
}
