//! `PropertySet` and related types for pass communication.
//!
//! Passes hand circuits to each other by value; everything else they need to
//! share (the target device, the layouts chosen so far, the run's report)
//! lives in a [`PropertySet`] threaded through the whole pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use qpipe_ir::{Circuit, QubitId};

use crate::config::{LayoutMethod, Strictness};
use crate::device::Device;
use crate::pass::Stage;

/// Injective mapping from virtual qubits to physical qubits.
///
/// Physical qubits with no virtual qubit assigned are free (ancillas). A
/// layout is only constructible when every virtual qubit has a distinct
/// physical qubit in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayoutRepr", into = "LayoutRepr")]
pub struct Layout {
    /// `virt_to_phys[v]` is the physical qubit hosting virtual qubit `v`.
    virt_to_phys: Vec<u32>,
    /// `phys_to_virt[p]` is the virtual qubit on physical qubit `p`, if any.
    phys_to_virt: Vec<Option<u32>>,
}

#[derive(Serialize, Deserialize)]
struct LayoutRepr {
    mapping: Vec<u32>,
    num_physical: u32,
}

impl TryFrom<LayoutRepr> for Layout {
    type Error = String;

    fn try_from(repr: LayoutRepr) -> Result<Self, Self::Error> {
        Layout::from_mapping(&repr.mapping, repr.num_physical).map_err(|e| e.to_string())
    }
}

impl From<Layout> for LayoutRepr {
    fn from(layout: Layout) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let num_physical = layout.phys_to_virt.len() as u32;
        LayoutRepr {
            mapping: layout.virt_to_phys,
            num_physical,
        }
    }
}

/// Why an explicit mapping cannot be a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutConflict {
    /// A target physical qubit does not exist.
    OutOfRange {
        /// The virtual qubit.
        virtual_qubit: u32,
        /// The requested physical qubit.
        physical: u32,
    },
    /// Two virtual qubits map to the same physical qubit.
    Duplicate {
        /// The shared physical qubit.
        physical: u32,
        /// First virtual qubit mapped there.
        first: u32,
        /// Second virtual qubit mapped there.
        second: u32,
    },
}

impl std::fmt::Display for LayoutConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutConflict::OutOfRange {
                virtual_qubit,
                physical,
            } => write!(
                f,
                "virtual qubit {virtual_qubit} mapped to nonexistent physical qubit {physical}"
            ),
            LayoutConflict::Duplicate {
                physical,
                first,
                second,
            } => write!(
                f,
                "virtual qubits {first} and {second} both mapped to physical qubit {physical}"
            ),
        }
    }
}

impl Layout {
    /// Virtual qubit i on physical qubit i.
    ///
    /// Caller guarantees `num_virtual <= num_physical`.
    pub fn trivial(num_virtual: u32, num_physical: u32) -> Self {
        let mut phys_to_virt = vec![None; num_physical as usize];
        for v in 0..num_virtual.min(num_physical) {
            phys_to_virt[v as usize] = Some(v);
        }
        Self {
            virt_to_phys: (0..num_virtual.min(num_physical)).collect(),
            phys_to_virt,
        }
    }

    /// Build from an explicit `virtual → physical` list.
    pub fn from_mapping(mapping: &[u32], num_physical: u32) -> Result<Self, LayoutConflict> {
        let mut phys_to_virt = vec![None; num_physical as usize];
        for (v, &p) in mapping.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let v = v as u32;
            let slot = phys_to_virt
                .get_mut(p as usize)
                .ok_or(LayoutConflict::OutOfRange {
                    virtual_qubit: v,
                    physical: p,
                })?;
            if let Some(first) = *slot {
                return Err(LayoutConflict::Duplicate {
                    physical: p,
                    first,
                    second: v,
                });
            }
            *slot = Some(v);
        }
        Ok(Self {
            virt_to_phys: mapping.to_vec(),
            phys_to_virt,
        })
    }

    /// Physical qubit hosting virtual qubit `v`.
    #[inline]
    pub fn physical(&self, v: QubitId) -> Option<u32> {
        self.virt_to_phys.get(v.index()).copied()
    }

    /// Virtual qubit on physical qubit `p`, if any.
    #[inline]
    pub fn virtual_at(&self, p: u32) -> Option<QubitId> {
        self.phys_to_virt.get(p as usize).copied().flatten().map(QubitId)
    }

    /// Exchange the contents of two physical qubits.
    pub fn swap_physical(&mut self, p1: u32, p2: u32) {
        let (a, b) = (p1 as usize, p2 as usize);
        self.phys_to_virt.swap(a, b);
        if let Some(v) = self.phys_to_virt[a] {
            self.virt_to_phys[v as usize] = p1;
        }
        if let Some(v) = self.phys_to_virt[b] {
            self.virt_to_phys[v as usize] = p2;
        }
    }

    /// `virtual → physical` list.
    pub fn mapping(&self) -> &[u32] {
        &self.virt_to_phys
    }

    /// Number of virtual qubits mapped.
    pub fn num_virtual(&self) -> usize {
        self.virt_to_phys.len()
    }

    /// Number of physical qubits.
    pub fn num_physical(&self) -> usize {
        self.phys_to_virt.len()
    }

    /// True if virtual qubit i sits on physical qubit i for every i.
    pub fn is_trivial(&self) -> bool {
        self.virt_to_phys
            .iter()
            .enumerate()
            .all(|(v, &p)| p as usize == v)
    }

    /// Iterate over (virtual, physical) pairs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.virt_to_phys
            .iter()
            .enumerate()
            .map(|(v, &p)| (QubitId(v as u32), p))
    }
}

/// Op count and depth after one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    /// The stage.
    pub stage: Stage,
    /// Number of operations.
    pub ops: usize,
    /// Circuit depth.
    pub depth: usize,
}

/// What a compilation run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileReport {
    /// Snapshot after each executed stage.
    pub stages: Vec<StageSummary>,
    /// Layout strategy that produced the initial layout.
    pub layout_method: Option<LayoutMethod>,
    /// Swaps inserted by routing.
    pub swaps_inserted: usize,
    /// Times the router fell back to shortest-path routing.
    pub release_valve_activations: usize,
    /// Decoupling sequences inserted.
    pub dd_sequences: usize,
    /// True if all passes were bypassed.
    pub skipped: bool,
}

impl CompileReport {
    /// Record the circuit shape after a stage.
    pub fn record(&mut self, stage: Stage, circuit: &Circuit) {
        self.stages.push(StageSummary {
            stage,
            ops: circuit.len(),
            depth: circuit.depth(),
        });
    }

    /// Summary for a given stage, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Properties shared between compilation passes.
///
/// | Field | Written by | Read by |
/// |-------|------------|---------|
/// | `layout` | layout selection | routing, primitives |
/// | `final_layout` | routing | primitives |
/// | `input` | pipeline | translation (error indices) |
/// | `report` | every pass | caller |
#[derive(Debug, Clone)]
pub struct PropertySet {
    /// Target device, shared read-only.
    pub device: Arc<Device>,

    /// Initial layout (virtual → physical), set at `LayoutChosen`.
    pub layout: Option<Layout>,

    /// Layout after routing permuted the qubits, set at `Routed`.
    pub final_layout: Option<Layout>,

    /// 1.0 is exact; lower values widen the identity tolerance.
    pub approximation_degree: f64,

    /// How shape mismatches are handled.
    pub strictness: Strictness,

    /// For each op of the current circuit, the input op it came from.
    /// `None` means ops still line up one to one with the input. Kept
    /// current up to `Translated`; inserted swaps have no origin.
    pub origins: Option<Vec<Option<usize>>>,

    /// Counters and snapshots for the run.
    pub report: CompileReport,
}

impl PropertySet {
    /// Create a property set for a device.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            layout: None,
            final_layout: None,
            approximation_degree: 1.0,
            strictness: Strictness::default(),
            origins: None,
            report: CompileReport::default(),
        }
    }

    /// Set the layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Numerical tolerance for identity detection and zero-angle dropping.
    pub fn tolerance(&self) -> f64 {
        1e-10 + (1.0 - self.approximation_degree.clamp(0.0, 1.0)) * 1e-2
    }

    /// Input-circuit index of op `idx` of the current circuit.
    pub fn origin_of(&self, idx: usize) -> Option<usize> {
        match &self.origins {
            None => Some(idx),
            Some(origins) => origins.get(idx).copied().flatten(),
        }
    }

    /// Record that a pass rebuilt the op list; `sources[k]` is the index in
    /// the pass's input of the op now at `k`.
    pub fn remap_origins(&mut self, sources: &[Option<usize>]) {
        let origins = sources
            .iter()
            .map(|src| src.and_then(|i| self.origin_of(i)))
            .collect();
        self.origins = Some(origins);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BasisGates, CouplingMap};

    #[test]
    fn test_layout_trivial() {
        let layout = Layout::trivial(3, 5);
        assert_eq!(layout.physical(QubitId(0)), Some(0));
        assert_eq!(layout.physical(QubitId(2)), Some(2));
        assert_eq!(layout.physical(QubitId(3)), None);
        assert_eq!(layout.virtual_at(2), Some(QubitId(2)));
        assert_eq!(layout.virtual_at(4), None);
        assert!(layout.is_trivial());
    }

    #[test]
    fn test_layout_swap() {
        let mut layout = Layout::trivial(3, 4);
        layout.swap_physical(0, 2);
        assert_eq!(layout.physical(QubitId(0)), Some(2));
        assert_eq!(layout.physical(QubitId(2)), Some(0));
        assert_eq!(layout.virtual_at(0), Some(QubitId(2)));

        // Swap into a free physical qubit.
        layout.swap_physical(1, 3);
        assert_eq!(layout.physical(QubitId(1)), Some(3));
        assert_eq!(layout.virtual_at(1), None);
        assert!(!layout.is_trivial());
    }

    #[test]
    fn test_layout_from_mapping_conflicts() {
        assert_eq!(
            Layout::from_mapping(&[1, 1], 3),
            Err(LayoutConflict::Duplicate {
                physical: 1,
                first: 0,
                second: 1
            })
        );
        assert!(matches!(
            Layout::from_mapping(&[0, 7], 3),
            Err(LayoutConflict::OutOfRange { physical: 7, .. })
        ));
        let layout = Layout::from_mapping(&[2, 0], 3).unwrap();
        assert_eq!(layout.virtual_at(2), Some(QubitId(0)));
    }

    #[test]
    fn test_layout_serde() {
        let layout = Layout::from_mapping(&[2, 0], 3).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(json, r#"{"mapping":[2,0],"num_physical":3}"#);
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
        assert!(serde_json::from_str::<Layout>(r#"{"mapping":[1,1],"num_physical":3}"#).is_err());
    }

    #[test]
    fn test_tolerance_scales_with_degree() {
        let device = Arc::new(Device::new("d", BasisGates::ibm(), CouplingMap::linear(2)));
        let mut props = PropertySet::new(device);
        assert!(props.tolerance() < 1e-9);
        props.approximation_degree = 0.0;
        assert!((props.tolerance() - (1e-10 + 1e-2)).abs() < 1e-15);
    }

    #[test]
    fn test_origins_compose_across_passes() {
        let device = Arc::new(Device::new("d", BasisGates::ibm(), CouplingMap::linear(2)));
        let mut props = PropertySet::new(device);
        assert_eq!(props.origin_of(4), Some(4));

        // Input op 1 expanded into three ops.
        props.remap_origins(&[Some(0), Some(1), Some(1), Some(1), Some(2)]);
        // A swap inserted before the last op.
        props.remap_origins(&[Some(0), Some(1), Some(2), Some(3), None, Some(4)]);

        assert_eq!(props.origin_of(3), Some(1));
        assert_eq!(props.origin_of(4), None);
        assert_eq!(props.origin_of(5), Some(2));
        assert_eq!(props.origin_of(9), None);
    }
}
