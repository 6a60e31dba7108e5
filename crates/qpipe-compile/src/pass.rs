//! Pass trait and pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use qpipe_ir::Circuit;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// Pipeline stages, in execution order.
///
/// A compilation moves strictly forward through these stages; a failure in
/// any stage aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Input checked and multi-qubit gates unrolled.
    Validated,
    /// Initial layout selected.
    LayoutChosen,
    /// Swaps inserted; circuit expressed over physical qubits.
    Routed,
    /// Every gate rewritten into the native basis.
    Translated,
    /// Single-qubit runs collapsed.
    LocallyOptimized,
    /// Idle windows filled with decoupling sequences.
    ErrorSuppressed,
    /// Output handed back to the caller.
    Finalized,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Stage; 7] = [
        Stage::Validated,
        Stage::LayoutChosen,
        Stage::Routed,
        Stage::Translated,
        Stage::LocallyOptimized,
        Stage::ErrorSuppressed,
        Stage::Finalized,
    ];

    /// Snake-case name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validated => "validated",
            Stage::LayoutChosen => "layout_chosen",
            Stage::Routed => "routed",
            Stage::Translated => "translated",
            Stage::LocallyOptimized => "locally_optimized",
            Stage::ErrorSuppressed => "error_suppressed",
            Stage::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compilation pass.
///
/// Passes consume a frozen circuit and return a new one; they communicate
/// through the [`PropertySet`] (layout, report counters, device).
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// The stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass.
    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit>;

    /// Check if this pass should run based on current state.
    fn should_run(&self, _circuit: &Circuit, _properties: &PropertySet) -> bool {
        true
    }
}
