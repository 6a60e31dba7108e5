//! Dependency graph over a circuit's operations.
//!
//! Nodes are operation indices. An edge `i -> j` labelled with a wire means
//! `j` is the next operation after `i` on that wire. Two operations are
//! ordered exactly when a path connects them; everything else may commute in
//! time.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex as PetNodeIndex};
use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG.
pub type NodeIndex = PetNodeIndex<u32>;

/// Identifier for a wire in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireId {
    /// A quantum wire.
    Qubit(QubitId),
    /// A classical wire.
    Clbit(ClbitId),
}

impl From<QubitId> for WireId {
    fn from(q: QubitId) -> Self {
        WireId::Qubit(q)
    }
}

impl From<ClbitId> for WireId {
    fn from(c: ClbitId) -> Self {
        WireId::Clbit(c)
    }
}

/// Read-only dependency DAG of a [`Circuit`].
///
/// Node `k` holds operation index `k`, so node indices and op indices agree.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    graph: DiGraph<usize, WireId, u32>,
}

impl CircuitDag {
    /// Build the DAG by threading each wire through the ops that touch it.
    pub fn from_circuit(circuit: &Circuit) -> Self {
        let mut graph = DiGraph::with_capacity(circuit.len(), circuit.len() * 2);
        let mut last_on_qubit: Vec<Option<NodeIndex>> = vec![None; circuit.num_qubits() as usize];
        let mut last_on_clbit: Vec<Option<NodeIndex>> = vec![None; circuit.num_clbits() as usize];

        for (idx, op) in circuit.ops().iter().enumerate() {
            let node = graph.add_node(idx);
            for &q in &op.qubits {
                if let Some(prev) = last_on_qubit[q.index()].replace(node) {
                    graph.add_edge(prev, node, WireId::Qubit(q));
                }
            }
            for &c in &op.clbits {
                if let Some(prev) = last_on_clbit[c.index()].replace(node) {
                    graph.add_edge(prev, node, WireId::Clbit(c));
                }
            }
        }

        Self { graph }
    }

    /// Number of operation nodes.
    pub fn num_ops(&self) -> usize {
        self.graph.node_count()
    }

    /// Ops that must run immediately before `op`, deduplicated and sorted.
    pub fn predecessors(&self, op: usize) -> Vec<usize> {
        self.neighbors(op, Direction::Incoming)
    }

    /// Ops that must run immediately after `op`, deduplicated and sorted.
    pub fn successors(&self, op: usize) -> Vec<usize> {
        self.neighbors(op, Direction::Outgoing)
    }

    fn neighbors(&self, op: usize, dir: Direction) -> Vec<usize> {
        if op >= self.num_ops() {
            return vec![];
        }
        let node = NodeIndex::new(op);
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(node, dir)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Ops with no predecessors.
    pub fn front_layer(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| self.graph[n])
            .collect()
    }

    /// Wires along which `from` directly feeds `to`.
    pub fn wires_between(&self, from: usize, to: usize) -> Vec<WireId> {
        if from >= self.num_ops() || to >= self.num_ops() {
            return vec![];
        }
        self.graph
            .edges_connecting(NodeIndex::new(from), NodeIndex::new(to))
            .map(|e| *e.weight())
            .collect()
    }

    /// A topological order of op indices.
    pub fn topological_order(&self) -> Vec<usize> {
        // Edges always point from lower to higher op index, so the graph is
        // acyclic by construction.
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n]).collect())
            .unwrap_or_else(|_| (0..self.num_ops()).collect())
    }

    /// Number of ops on the longest dependency path.
    pub fn depth(&self) -> usize {
        let mut level = vec![0usize; self.num_ops()];
        let mut depth = 0;
        for op in self.topological_order() {
            let start = self
                .predecessors(op)
                .into_iter()
                .map(|p| level[p])
                .max()
                .unwrap_or(0);
            level[op] = start + 1;
            depth = depth.max(level[op]);
        }
        depth
    }

    /// The underlying petgraph graph.
    pub fn graph(&self) -> &DiGraph<usize, WireId, u32> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitBuilder;

    fn sample() -> Circuit {
        let mut b = CircuitBuilder::new("dag", 3, 1);
        b.h(QubitId(0))
            .unwrap()
            .x(QubitId(2))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(1), QubitId(2))
            .unwrap()
            .measure(QubitId(2), ClbitId(0))
            .unwrap();
        b.build()
    }

    #[test]
    fn test_front_layer() {
        let dag = sample().to_dag();
        assert_eq!(dag.front_layer(), vec![0, 1]);
    }

    #[test]
    fn test_predecessors_and_successors() {
        let dag = sample().to_dag();
        assert_eq!(dag.predecessors(3), vec![1, 2]);
        assert_eq!(dag.successors(0), vec![2]);
        assert_eq!(dag.successors(3), vec![4]);
        assert!(dag.predecessors(99).is_empty());
        assert_eq!(dag.wires_between(2, 3), vec![WireId::Qubit(QubitId(1))]);
    }

    #[test]
    fn test_depth_matches_circuit() {
        let c = sample();
        assert_eq!(c.to_dag().depth(), c.depth());
        assert_eq!(c.depth(), 4);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let dag = sample().to_dag();
        let order = dag.topological_order();
        let pos = |op: usize| order.iter().position(|&o| o == op).unwrap();
        for op in 0..dag.num_ops() {
            for succ in dag.successors(op) {
                assert!(pos(op) < pos(succ));
            }
        }
    }
}
