//! Initial layout selection.

use tracing::{debug, info, warn};

use qpipe_ir::{Circuit, Instruction};

use crate::config::{DEFAULT_ROUTING_ITERATION_FACTOR, LayoutMethod, LevelPolicy, Strictness};
use crate::device::Device;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, Stage};
use crate::passes::target::routing::{SabreParams, sabre_route};
use crate::property::{Layout, PropertySet};

/// Chooses the initial virtual-to-physical mapping.
///
/// An explicit mapping always wins. Otherwise the strategy runs:
/// - `Trivial`: virtual qubit i on physical qubit i.
/// - `Vf2`: subgraph search for a layout needing no swaps; falls back to
///   `Sabre` when none is found within the search budget.
/// - `Sabre`: forward/backward routing rounds, keeping the layout that
///   needs the fewest swaps.
pub struct LayoutSelection {
    method: LayoutMethod,
    mapping: Option<Vec<u32>>,
    policy: &'static LevelPolicy,
}

impl LayoutSelection {
    /// Select with a strategy.
    pub fn new(method: LayoutMethod, policy: &'static LevelPolicy) -> Self {
        Self {
            method,
            mapping: None,
            policy,
        }
    }

    /// Use an explicit mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: Vec<u32>) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

impl Pass for LayoutSelection {
    fn name(&self) -> &'static str {
        "LayoutSelection"
    }

    fn stage(&self) -> Stage {
        Stage::LayoutChosen
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let device = properties.device.clone();
        let num_virtual = circuit.num_qubits();
        let num_physical = device.num_qubits();
        if num_virtual > num_physical {
            return Err(CompileError::InsufficientQubits {
                stage: Stage::LayoutChosen,
                required: num_virtual,
                available: num_physical,
                detail: format!("device '{}' is too small", device.name()),
            });
        }

        let (layout, used) = match &self.mapping {
            Some(mapping) => (
                explicit_layout(mapping, num_virtual, num_physical, properties.strictness)?,
                None,
            ),
            None => {
                let (layout, used) = self.select(&circuit, &device)?;
                (layout, Some(used))
            }
        };

        info!(
            "Initial layout {:?} via {}",
            layout.mapping(),
            used.map_or_else(|| "explicit mapping".to_string(), |m| m.to_string())
        );
        properties.report.layout_method = used;
        properties.layout = Some(layout);
        Ok(circuit)
    }
}

impl LayoutSelection {
    fn select(&self, circuit: &Circuit, device: &Device) -> CompileResult<(Layout, LayoutMethod)> {
        let nv = circuit.num_qubits();
        let np = device.num_qubits();
        match self.method {
            LayoutMethod::Trivial => Ok((Layout::trivial(nv, np), LayoutMethod::Trivial)),
            LayoutMethod::Vf2 => {
                let trivial = Layout::trivial(nv, np);
                if self.policy.prefer_perfect_trivial && is_perfect(circuit, device, &trivial) {
                    return Ok((trivial, LayoutMethod::Trivial));
                }
                let budget = Vf2Budget {
                    call_limit: self.policy.vf2_call_limit.max(1),
                    max_solutions: self.policy.vf2_max_solutions.max(1),
                };
                if let Some(layout) = vf2_layout(circuit, device, &budget) {
                    return Ok((layout, LayoutMethod::Vf2));
                }
                debug!("No perfect layout found, falling back to sabre layout");
                Ok((self.sabre(circuit, device)?, LayoutMethod::Sabre))
            }
            LayoutMethod::Sabre => Ok((self.sabre(circuit, device)?, LayoutMethod::Sabre)),
        }
    }

    fn sabre(&self, circuit: &Circuit, device: &Device) -> CompileResult<Layout> {
        sabre_layout(
            circuit,
            device,
            self.policy.sabre_layout_rounds.max(1),
            self.policy.lookahead_size,
            self.policy.lookahead_weight,
        )
    }
}

/// Turn an explicit mapping into a layout, completing or rejecting partial
/// mappings according to `strictness`.
pub fn explicit_layout(
    mapping: &[u32],
    num_virtual: u32,
    num_physical: u32,
    strictness: Strictness,
) -> CompileResult<Layout> {
    let infeasible = |detail: String| CompileError::InsufficientQubits {
        stage: Stage::LayoutChosen,
        required: num_virtual,
        available: num_physical,
        detail,
    };

    let mut mapping = mapping.to_vec();
    if mapping.len() > num_virtual as usize {
        if strictness == Strictness::Strict {
            return Err(infeasible(format!(
                "mapping lists {} qubits, circuit has {num_virtual}",
                mapping.len()
            )));
        }
        warn!(
            "Ignoring {} extra layout entries",
            mapping.len() - num_virtual as usize
        );
        mapping.truncate(num_virtual as usize);
    }

    // Reject conflicts in what the caller gave before completing anything.
    Layout::from_mapping(&mapping, num_physical).map_err(|e| infeasible(e.to_string()))?;

    if mapping.len() < num_virtual as usize {
        if strictness == Strictness::Strict {
            return Err(infeasible(format!(
                "mapping covers {} of {num_virtual} virtual qubits",
                mapping.len()
            )));
        }
        let mut free = (0..num_physical)
            .filter(|p| !mapping.contains(p))
            .collect::<Vec<_>>()
            .into_iter();
        while mapping.len() < num_virtual as usize {
            let p = free
                .next()
                .ok_or_else(|| infeasible("no free physical qubit left".into()))?;
            mapping.push(p);
        }
    }

    Layout::from_mapping(&mapping, num_physical).map_err(|e| infeasible(e.to_string()))
}

/// True if every two-qubit interaction is already adjacent under `layout`.
pub fn is_perfect(circuit: &Circuit, device: &Device, layout: &Layout) -> bool {
    circuit.interaction_pairs().iter().all(|&(a, b)| {
        matches!(
            (layout.physical(a), layout.physical(b)),
            (Some(pa), Some(pb)) if device.are_connected(pa, pb)
        )
    })
}

/// Search limits for [`vf2_layout`].
#[derive(Debug, Clone, Copy)]
pub struct Vf2Budget {
    /// Maximum search states visited.
    pub call_limit: usize,
    /// Solutions compared when the device has edge errors.
    pub max_solutions: usize,
}

/// Find a layout under which every interaction pair is a coupling edge.
///
/// Backtracking subgraph-monomorphism search: virtual qubits are placed in
/// connectivity order (each next qubit has as many placed neighbours as
/// possible), candidates are tried in ascending physical order and pruned by
/// degree. Qubits without interactions take the lowest free physical qubits.
/// With edge errors, up to `max_solutions` layouts are scored by summed edge
/// error; otherwise the first is returned. `None` when no layout exists or
/// the budget runs out first.
pub fn vf2_layout(circuit: &Circuit, device: &Device, budget: &Vf2Budget) -> Option<Layout> {
    let nv = circuit.num_qubits() as usize;
    let np = device.num_qubits();
    if nv > np as usize {
        return None;
    }

    let pairs = circuit.interaction_pairs();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nv];
    for &(a, b) in &pairs {
        adjacency[a.index()].push(b.index());
        adjacency[b.index()].push(a.index());
    }

    let order = placement_order(&adjacency);
    let mut search = Vf2Search {
        device,
        adjacency: &adjacency,
        order: &order,
        assignment: vec![None; nv],
        used: vec![false; np as usize],
        calls: 0,
        budget,
        solutions: Vec::new(),
        want: if device.has_error_weights() {
            budget.max_solutions
        } else {
            1
        },
    };
    search.extend(0);

    let score = |assignment: &[Option<u32>]| -> f64 {
        pairs
            .iter()
            .map(|&(a, b)| match (assignment[a.index()], assignment[b.index()]) {
                (Some(pa), Some(pb)) => device.edge_error(pa, pb).unwrap_or(0.0),
                _ => 0.0,
            })
            .sum()
    };

    let mut best: Option<(f64, Vec<Option<u32>>)> = None;
    for solution in search.solutions {
        let s = score(&solution);
        if best.as_ref().is_none_or(|(b, _)| s < *b) {
            best = Some((s, solution));
        }
    }
    let (_, mut assignment) = best?;

    // Isolated qubits take the lowest free physical qubits.
    let mut used: Vec<bool> = vec![false; np as usize];
    for p in assignment.iter().flatten() {
        used[*p as usize] = true;
    }
    let mut free = (0..np).filter(|p| !used[*p as usize]);
    for slot in &mut assignment {
        if slot.is_none() {
            *slot = Some(free.next()?);
        }
    }
    let mapping: Vec<u32> = assignment.into_iter().flatten().collect();
    Layout::from_mapping(&mapping, np).ok()
}

fn placement_order(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let mut placed = vec![false; n];
    let mut order = Vec::new();
    let interacting: Vec<usize> = (0..n).filter(|&v| !adjacency[v].is_empty()).collect();
    while order.len() < interacting.len() {
        let next = interacting
            .iter()
            .copied()
            .filter(|&v| !placed[v])
            .max_by(|&a, &b| {
                let links = |v: usize| adjacency[v].iter().filter(|&&u| placed[u]).count();
                links(a)
                    .cmp(&links(b))
                    .then(adjacency[a].len().cmp(&adjacency[b].len()))
                    .then(b.cmp(&a))
            });
        let Some(v) = next else { break };
        placed[v] = true;
        order.push(v);
    }
    order
}

struct Vf2Search<'a> {
    device: &'a Device,
    adjacency: &'a [Vec<usize>],
    order: &'a [usize],
    assignment: Vec<Option<u32>>,
    used: Vec<bool>,
    calls: usize,
    budget: &'a Vf2Budget,
    solutions: Vec<Vec<Option<u32>>>,
    want: usize,
}

impl Vf2Search<'_> {
    fn done(&self) -> bool {
        self.solutions.len() >= self.want || self.calls >= self.budget.call_limit
    }

    fn extend(&mut self, depth: usize) {
        self.calls += 1;
        if self.done() {
            return;
        }
        let Some(&v) = self.order.get(depth) else {
            self.solutions.push(self.assignment.clone());
            return;
        };

        let degree = self.adjacency[v].len();
        let anchor = self.adjacency[v]
            .iter()
            .find_map(|&u| self.assignment[u]);
        let candidates: Vec<u32> = match anchor {
            Some(p) => self.device.neighbors(p).to_vec(),
            None => (0..self.device.num_qubits()).collect(),
        };

        for p in candidates {
            if self.used[p as usize] || self.device.neighbors(p).len() < degree {
                continue;
            }
            let consistent = self.adjacency[v].iter().all(|&u| match self.assignment[u] {
                Some(pu) => self.device.are_connected(p, pu),
                None => true,
            });
            if !consistent {
                continue;
            }
            self.assignment[v] = Some(p);
            self.used[p as usize] = true;
            self.extend(depth + 1);
            self.assignment[v] = None;
            self.used[p as usize] = false;
            if self.done() {
                return;
            }
        }
    }
}

/// Refine a layout by routing forward and backward.
///
/// Starting from the trivial layout, each round routes the two-qubit skeleton
/// forward, then routes the reversed skeleton from the resulting final
/// layout; the final layout of the backward pass seeds the next round. The
/// layout whose forward pass needed the fewest swaps wins, the earliest on
/// ties.
pub fn sabre_layout(
    circuit: &Circuit,
    device: &Device,
    rounds: usize,
    lookahead_size: usize,
    lookahead_weight: f64,
) -> CompileResult<Layout> {
    let nv = circuit.num_qubits();
    let np = device.num_qubits();
    let skeleton: Vec<Instruction> = circuit
        .ops()
        .iter()
        .filter(|op| op.is_two_qubit_gate())
        .cloned()
        .collect();
    let forward = Circuit::from_ops("sabre_layout", nv, 0, skeleton.iter().cloned())?;
    let backward = Circuit::from_ops("sabre_layout_rev", nv, 0, skeleton.into_iter().rev())?;

    let params = SabreParams {
        lookahead_size,
        lookahead_weight,
        iteration_limit: (forward.len() + 1).saturating_mul(DEFAULT_ROUTING_ITERATION_FACTOR),
    };

    let mut candidate = Layout::trivial(nv, np);
    let mut best: Option<(usize, Layout)> = None;
    for round in 0..rounds {
        let fwd = sabre_route(&forward, device, candidate.clone(), &params)?;
        debug!("Sabre layout round {}: {} swaps", round, fwd.swaps);
        if best.as_ref().is_none_or(|(swaps, _)| fwd.swaps < *swaps) {
            best = Some((fwd.swaps, candidate.clone()));
        }
        if fwd.swaps == 0 {
            break;
        }
        let bwd = sabre_route(&backward, device, fwd.final_layout, &params)?;
        candidate = bwd.final_layout;
    }

    Ok(best.map_or_else(|| Layout::trivial(nv, np), |(_, layout)| layout))
}
