//! Target device model: native basis, connectivity and calibration weights.
//!
//! A [`Device`] is immutable once built and is shared between pipelines
//! behind an `Arc`. Shortest paths are precomputed with a BFS from every
//! physical qubit, so routing heuristics get O(1) distance lookups.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Largest qubit count [`Device::preset`] will build.
pub const MAX_PRESET_QUBITS: u32 = 1024;

/// Operations every device accepts regardless of its basis.
const ALWAYS_ALLOWED: [&str; 3] = ["measure", "barrier", "delay"];

/// Undirected connectivity graph over physical qubits.
///
/// Neighbour lists are kept sorted, which makes BFS paths (and therefore
/// routing) deterministic: among equal-length paths the one through lower
/// indices wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMap {
    /// Connected pairs, normalized to `(min, max)`, in insertion order.
    edges: Vec<(u32, u32)>,
    /// Number of physical qubits.
    num_qubits: u32,
    /// Sorted adjacency lists.
    adjacency: Vec<Vec<u32>>,
    /// `dist_matrix[from][to]`, or `u32::MAX` if unreachable.
    dist_matrix: Vec<Vec<u32>>,
    /// `pred_matrix[from][to]` is the hop before `to` on the path from `from`.
    pred_matrix: Vec<Vec<u32>>,
}

impl CouplingMap {
    /// Build a coupling map from an edge list.
    ///
    /// Duplicate edges (including reversed pairs) are ignored. Self-loops and
    /// out-of-range endpoints are rejected.
    pub fn from_edges(
        num_qubits: u32,
        edges: impl IntoIterator<Item = (u32, u32)>,
    ) -> CompileResult<Self> {
        let edges: Vec<(u32, u32)> = edges.into_iter().collect();
        for &(a, b) in &edges {
            if a >= num_qubits || b >= num_qubits {
                return Err(CompileError::InvalidConfiguration(format!(
                    "edge ({a}, {b}) references a qubit outside 0..{num_qubits}"
                )));
            }
            if a == b {
                return Err(CompileError::InvalidConfiguration(format!(
                    "self-loop on qubit {a}"
                )));
            }
        }
        Ok(Self::trusted(num_qubits, edges))
    }

    fn add_edge(&mut self, q1: u32, q2: u32) {
        let edge = (q1.min(q2), q1.max(q2));
        if self.edges.contains(&edge) {
            return;
        }
        self.edges.push(edge);
        self.adjacency[q1 as usize].push(q2);
        self.adjacency[q2 as usize].push(q1);
    }

    /// Precompute all-pairs shortest paths using BFS from each node.
    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist_matrix = vec![vec![u32::MAX; n]; n];
        self.pred_matrix = vec![vec![u32::MAX; n]; n];

        for src in 0..n {
            self.dist_matrix[src][src] = 0;
            let mut queue = VecDeque::new();
            #[allow(clippy::cast_possible_truncation)]
            queue.push_back(src as u32);

            while let Some(current) = queue.pop_front() {
                let cur = current as usize;
                for &neighbor in &self.adjacency[cur] {
                    let nb = neighbor as usize;
                    if self.dist_matrix[src][nb] == u32::MAX {
                        self.dist_matrix[src][nb] = self.dist_matrix[src][cur] + 1;
                        self.pred_matrix[src][nb] = current;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    /// Get the number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the coupling edges.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(q1 as usize)
            .is_some_and(|neighbors| neighbors.binary_search(&q2).is_ok())
    }

    /// Neighbours of a qubit, ascending.
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        self.adjacency
            .get(qubit as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Shortest-path distance in edges, `None` if unreachable or out of range.
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        let d = *self.dist_matrix.get(from as usize)?.get(to as usize)?;
        (d != u32::MAX).then_some(d)
    }

    /// Shortest path `from → to`, both endpoints included.
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        self.distance(from, to)?;
        let row = &self.pred_matrix[from as usize];
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            current = row[current as usize];
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Longest shortest path, `None` if the graph is disconnected.
    pub fn diameter(&self) -> Option<u32> {
        let mut diameter = 0;
        for row in &self.dist_matrix {
            for &d in row {
                if d == u32::MAX {
                    return None;
                }
                diameter = diameter.max(d);
            }
        }
        Some(diameter)
    }

    /// Degree of a qubit.
    pub fn degree(&self, qubit: u32) -> usize {
        self.neighbors(qubit).len()
    }

    /// Linear chain 0-1-2-...
    pub fn linear(n: u32) -> Self {
        Self::trusted(n, (1..n).map(|i| (i - 1, i)))
    }

    /// Linear chain closed into a cycle.
    pub fn ring(n: u32) -> Self {
        let closing = (n > 2).then(|| (0, n - 1));
        Self::trusted(n, (1..n).map(|i| (i - 1, i)).chain(closing))
    }

    /// `rows × cols` grid, row-major numbering.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    edges.push((q, q + 1));
                }
                if r + 1 < rows {
                    edges.push((q, q + cols));
                }
            }
        }
        Self::trusted(rows * cols, edges)
    }

    /// Every pair connected.
    pub fn full(n: u32) -> Self {
        Self::trusted(n, (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))))
    }

    /// Qubit 0 connected to every other qubit.
    pub fn star(n: u32) -> Self {
        Self::trusted(n, (1..n).map(|i| (0, i)))
    }

    /// Build from edges known to be in range and loop-free.
    fn trusted(n: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut map = Self {
            edges: vec![],
            num_qubits: n,
            adjacency: vec![vec![]; n as usize],
            dist_matrix: vec![],
            pred_matrix: vec![],
        };
        for (a, b) in edges {
            map.add_edge(a, b);
        }
        for neighbors in &mut map.adjacency {
            neighbors.sort_unstable();
        }
        map.precompute_distances();
        map
    }
}

/// Native gate set of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisGates {
    gates: Vec<String>,
}

impl BasisGates {
    /// Create a new basis gates set.
    pub fn new(gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut gates: Vec<String> = gates.into_iter().map(Into::into).collect();
        gates.sort();
        gates.dedup();
        Self { gates }
    }

    /// Check if a gate is in the basis.
    pub fn contains(&self, gate: &str) -> bool {
        self.gates.binary_search_by(|g| g.as_str().cmp(gate)).is_ok()
    }

    /// Get the basis gates, sorted.
    pub fn gates(&self) -> &[String] {
        &self.gates
    }

    /// IBM basis (RZ + SX + X + CX).
    pub fn ibm() -> Self {
        Self::new(["rz", "sx", "x", "cx"])
    }

    /// IBM Heron basis (RZ + SX + X + CZ).
    pub fn heron() -> Self {
        Self::new(["rz", "sx", "x", "cz"])
    }

    /// IQM basis (PRX + CZ).
    pub fn iqm() -> Self {
        Self::new(["prx", "cz"])
    }
}

/// Named basis presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisPreset {
    /// `rz sx x cx`
    Ibm,
    /// `rz sx x cz`
    Heron,
    /// `prx cz`
    Iqm,
}

impl BasisPreset {
    /// The gate set.
    pub fn gates(self) -> BasisGates {
        match self {
            BasisPreset::Ibm => BasisGates::ibm(),
            BasisPreset::Heron => BasisGates::heron(),
            BasisPreset::Iqm => BasisGates::iqm(),
        }
    }

    /// Typical gate durations in device time units (ns).
    fn durations(self) -> Vec<(&'static str, u64)> {
        match self {
            BasisPreset::Ibm => vec![
                ("rz", 0),
                ("sx", 36),
                ("x", 36),
                ("cx", 300),
                ("measure", 1200),
            ],
            BasisPreset::Heron => vec![
                ("rz", 0),
                ("sx", 32),
                ("x", 32),
                ("cz", 68),
                ("measure", 1200),
            ],
            BasisPreset::Iqm => vec![("prx", 20), ("cz", 40), ("measure", 500)],
        }
    }
}

impl FromStr for BasisPreset {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ibm" => Ok(BasisPreset::Ibm),
            "heron" => Ok(BasisPreset::Heron),
            "iqm" => Ok(BasisPreset::Iqm),
            other => Err(CompileError::InvalidConfiguration(format!(
                "unknown basis preset '{other}' (expected ibm, heron or iqm)"
            ))),
        }
    }
}

/// Immutable description of a target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DeviceSpec", into = "DeviceSpec")]
pub struct Device {
    name: String,
    basis: BasisGates,
    coupling: CouplingMap,
    gate_errors: FxHashMap<String, f64>,
    edge_errors: FxHashMap<(u32, u32), f64>,
    durations: FxHashMap<String, u64>,
}

impl Device {
    /// Create a device with no calibration data.
    pub fn new(name: impl Into<String>, basis: BasisGates, coupling: CouplingMap) -> Self {
        Self {
            name: name.into(),
            basis,
            coupling,
            gate_errors: FxHashMap::default(),
            edge_errors: FxHashMap::default(),
            durations: FxHashMap::default(),
        }
    }

    /// Attach an error rate to a gate kind.
    #[must_use]
    pub fn with_gate_error(mut self, gate: impl Into<String>, error: f64) -> Self {
        self.gate_errors.insert(gate.into(), error);
        self
    }

    /// Attach an error rate to a coupling edge.
    #[must_use]
    pub fn with_edge_error(mut self, q1: u32, q2: u32, error: f64) -> Self {
        self.edge_errors.insert((q1.min(q2), q1.max(q2)), error);
        self
    }

    /// Attach a duration to a gate kind.
    #[must_use]
    pub fn with_duration(mut self, gate: impl Into<String>, duration: u64) -> Self {
        self.durations.insert(gate.into(), duration);
        self
    }

    /// Build a preset device.
    ///
    /// `spec` is `<topology>:<size>[:<basis>]`, e.g. `linear:5`, `ring:8:iqm`
    /// or `grid:3x4:heron`. The basis defaults to `ibm`. Presets carry
    /// typical durations for their basis.
    pub fn preset(spec: &str) -> CompileResult<Self> {
        let invalid = |why: &str| {
            CompileError::InvalidConfiguration(format!("device preset '{spec}': {why}"))
        };
        let mut parts = spec.split(':');
        let topology = parts.next().unwrap_or_default();
        let size = parts.next().ok_or_else(|| invalid("missing size"))?;
        let basis: BasisPreset = parts.next().unwrap_or("ibm").parse()?;
        if parts.next().is_some() {
            return Err(invalid("too many fields"));
        }

        let parse_n =
            |s: &str| -> CompileResult<u32> { s.parse().map_err(|_| invalid("bad size")) };
        let check = |n: u64| -> CompileResult<()> {
            if n > u64::from(MAX_PRESET_QUBITS) {
                return Err(invalid(&format!(
                    "{n} qubits exceeds the preset limit of {MAX_PRESET_QUBITS}"
                )));
            }
            Ok(())
        };
        let coupling = match topology {
            "linear" | "ring" | "full" | "star" => {
                let n = parse_n(size)?;
                check(u64::from(n))?;
                match topology {
                    "linear" => CouplingMap::linear(n),
                    "ring" => CouplingMap::ring(n),
                    "full" => CouplingMap::full(n),
                    _ => CouplingMap::star(n),
                }
            }
            "grid" => {
                let (r, c) = size
                    .split_once('x')
                    .ok_or_else(|| invalid("grid size must be <rows>x<cols>"))?;
                let (rows, cols) = (parse_n(r)?, parse_n(c)?);
                check(u64::from(rows) * u64::from(cols))?;
                CouplingMap::grid(rows, cols)
            }
            other => return Err(invalid(&format!("unknown topology '{other}'"))),
        };

        let mut device = Device::new(spec, basis.gates(), coupling);
        for (gate, duration) in basis.durations() {
            device = device.with_duration(gate, duration);
        }
        Ok(device)
    }

    /// Load from a YAML description.
    pub fn from_yaml(text: &str) -> CompileResult<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| CompileError::InvalidConfiguration(format!("device YAML: {e}")))
    }

    /// Load from a JSON description.
    pub fn from_json(text: &str) -> CompileResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| CompileError::InvalidConfiguration(format!("device JSON: {e}")))
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of physical qubits.
    pub fn num_qubits(&self) -> u32 {
        self.coupling.num_qubits()
    }

    /// The native basis.
    pub fn basis(&self) -> &BasisGates {
        &self.basis
    }

    /// The connectivity graph.
    pub fn coupling_map(&self) -> &CouplingMap {
        &self.coupling
    }

    /// Whether a gate (or measure/barrier/delay) can run without translation.
    pub fn is_native_gate(&self, kind: &str) -> bool {
        ALWAYS_ALLOWED.contains(&kind) || self.basis.contains(kind)
    }

    /// Whether two physical qubits share an edge.
    pub fn are_connected(&self, a: u32, b: u32) -> bool {
        self.coupling.is_connected(a, b)
    }

    /// Shortest path between two physical qubits, both endpoints included.
    pub fn shortest_path(&self, a: u32, b: u32) -> Option<Vec<u32>> {
        self.coupling.shortest_path(a, b)
    }

    /// Shortest-path distance in edges.
    pub fn distance(&self, a: u32, b: u32) -> Option<u32> {
        self.coupling.distance(a, b)
    }

    /// Neighbours of a physical qubit, ascending.
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        self.coupling.neighbors(qubit)
    }

    /// Diameter of the connectivity graph.
    pub fn diameter(&self) -> Option<u32> {
        self.coupling.diameter()
    }

    /// Error rate of a gate kind, if calibrated.
    pub fn gate_error(&self, gate: &str) -> Option<f64> {
        self.gate_errors.get(gate).copied()
    }

    /// Error rate of an edge, if calibrated.
    pub fn edge_error(&self, a: u32, b: u32) -> Option<f64> {
        self.edge_errors.get(&(a.min(b), a.max(b))).copied()
    }

    /// True if any per-gate or per-edge error is known.
    pub fn has_error_weights(&self) -> bool {
        !self.gate_errors.is_empty() || !self.edge_errors.is_empty()
    }

    /// Duration of a gate kind, if known.
    pub fn duration(&self, gate: &str) -> Option<u64> {
        self.durations.get(gate).copied()
    }

    /// True if any duration is known.
    pub fn has_durations(&self) -> bool {
        !self.durations.is_empty()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} qubits, {} edges, basis [{}])",
            self.name,
            self.num_qubits(),
            self.coupling.edges().len(),
            self.basis.gates().join(", ")
        )
    }
}

/// Plain serialized form of a [`Device`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device name.
    #[serde(default)]
    pub name: String,
    /// Number of physical qubits.
    pub num_qubits: u32,
    /// Native gate names.
    pub basis: Vec<String>,
    /// Undirected coupling edges.
    #[serde(default)]
    pub edges: Vec<(u32, u32)>,
    /// Per-gate error rates.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gate_errors: BTreeMap<String, f64>,
    /// Per-edge error rates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_errors: Vec<EdgeError>,
    /// Per-gate durations in device time units.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub durations: BTreeMap<String, u64>,
}

/// Error rate of one coupling edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeError {
    /// The edge endpoints.
    pub qubits: (u32, u32),
    /// Error rate.
    pub error: f64,
}

impl TryFrom<DeviceSpec> for Device {
    type Error = CompileError;

    fn try_from(spec: DeviceSpec) -> Result<Self, Self::Error> {
        let coupling = CouplingMap::from_edges(spec.num_qubits, spec.edges)?;
        let mut device = Device::new(spec.name, BasisGates::new(spec.basis), coupling);
        for (gate, error) in spec.gate_errors {
            device = device.with_gate_error(gate, error);
        }
        for EdgeError { qubits: (a, b), error } in spec.edge_errors {
            if !device.are_connected(a, b) {
                return Err(CompileError::InvalidConfiguration(format!(
                    "error given for ({a}, {b}), which is not an edge"
                )));
            }
            device = device.with_edge_error(a, b, error);
        }
        for (gate, duration) in spec.durations {
            device = device.with_duration(gate, duration);
        }
        Ok(device)
    }
}

impl From<Device> for DeviceSpec {
    fn from(device: Device) -> Self {
        let mut edge_errors: Vec<EdgeError> = device
            .edge_errors
            .iter()
            .map(|(&qubits, &error)| EdgeError { qubits, error })
            .collect();
        edge_errors.sort_by_key(|e| e.qubits);
        DeviceSpec {
            num_qubits: device.num_qubits(),
            basis: device.basis.gates().to_vec(),
            edges: device.coupling.edges().to_vec(),
            gate_errors: device.gate_errors.into_iter().collect(),
            durations: device.durations.into_iter().collect(),
            edge_errors,
            name: device.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupling_map_linear() {
        let map = CouplingMap::linear(5);
        assert!(map.is_connected(0, 1));
        assert!(map.is_connected(1, 0));
        assert!(!map.is_connected(0, 2));
        assert_eq!(map.distance(0, 4), Some(4));
        assert_eq!(map.shortest_path(0, 3), Some(vec![0, 1, 2, 3]));
        assert_eq!(map.diameter(), Some(4));
    }

    #[test]
    fn test_coupling_map_star() {
        let map = CouplingMap::star(5);
        assert!(map.is_connected(0, 4));
        assert!(!map.is_connected(1, 2));
        assert_eq!(map.distance(1, 2), Some(2));
        assert_eq!(map.shortest_path(3, 1), Some(vec![3, 0, 1]));
    }

    #[test]
    fn test_ring_and_grid() {
        let ring = CouplingMap::ring(6);
        assert_eq!(ring.distance(0, 5), Some(1));
        assert_eq!(ring.diameter(), Some(3));

        let grid = CouplingMap::grid(2, 3);
        assert_eq!(grid.num_qubits(), 6);
        assert!(grid.is_connected(0, 3));
        assert!(grid.is_connected(4, 5));
        assert!(!grid.is_connected(2, 3));
        assert_eq!(grid.neighbors(1), &[0, 2, 4]);
    }

    #[test]
    fn test_disconnected_map() {
        let map = CouplingMap::from_edges(4, [(0, 1), (2, 3)]).unwrap();
        assert_eq!(map.distance(0, 3), None);
        assert_eq!(map.shortest_path(1, 2), None);
        assert_eq!(map.diameter(), None);
    }

    #[test]
    fn test_invalid_edges_rejected() {
        assert!(CouplingMap::from_edges(2, [(0, 2)]).is_err());
        assert!(CouplingMap::from_edges(2, [(1, 1)]).is_err());
    }

    #[test]
    fn test_native_gates() {
        let device = Device::new("d", BasisGates::ibm(), CouplingMap::linear(2));
        assert!(device.is_native_gate("rz"));
        assert!(device.is_native_gate("measure"));
        assert!(device.is_native_gate("barrier"));
        assert!(!device.is_native_gate("h"));
    }

    #[test]
    fn test_preset_parsing() {
        let d = Device::preset("grid:2x3:heron").unwrap();
        assert_eq!(d.num_qubits(), 6);
        assert!(d.is_native_gate("cz"));
        assert_eq!(d.duration("cz"), Some(68));

        let d = Device::preset("ring:4").unwrap();
        assert!(d.is_native_gate("cx"));

        assert!(Device::preset("moebius:4").is_err());
        assert!(Device::preset("linear").is_err());
        assert!(Device::preset("linear:3:foo").is_err());
    }

    #[test]
    fn test_preset_size_limit() {
        assert!(Device::preset(&format!("linear:{MAX_PRESET_QUBITS}")).is_ok());
        for spec in ["linear:200000", "full:5000", "grid:1000x1000", "grid:4294967295x2"] {
            let err = Device::preset(spec).unwrap_err();
            assert!(matches!(err, CompileError::InvalidConfiguration(_)), "{spec}");
        }
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r"
name: toy
num_qubits: 3
basis: [rz, sx, x, cx]
edges: [[0, 1], [1, 2]]
gate_errors:
  sx: 0.001
edge_errors:
  - qubits: [1, 2]
    error: 0.02
durations:
  cx: 300
";
        let device = Device::from_yaml(yaml).unwrap();
        assert_eq!(device.name(), "toy");
        assert!(device.are_connected(2, 1));
        assert_eq!(device.distance(0, 2), Some(2));
        assert_eq!(device.edge_error(2, 1), Some(0.02));
        assert_eq!(device.gate_error("sx"), Some(0.001));
        assert_eq!(device.duration("cx"), Some(300));

        let json = serde_json::to_string(&device).unwrap();
        let back = Device::from_json(&json).unwrap();
        assert_eq!(back, device);
    }

    #[test]
    fn test_yaml_bad_edge_error() {
        let yaml = r"
num_qubits: 3
basis: [cx]
edges: [[0, 1]]
edge_errors:
  - qubits: [0, 2]
    error: 0.1
";
        assert!(Device::from_yaml(yaml).is_err());
    }
}
