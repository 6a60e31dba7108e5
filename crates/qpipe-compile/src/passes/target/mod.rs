//! Target-specific compilation passes.
//!
//! These passes read the device from the [`PropertySet`](crate::PropertySet)
//! and produce circuits over physical qubits in the native basis.

pub mod decoupling;
pub mod layout;
pub mod optimization;
pub mod routing;
pub mod translation;

pub use decoupling::DynamicalDecoupling;
pub use layout::LayoutSelection;
pub use optimization::LocalOptimization;
pub use routing::{SabreRouting, StochasticRouting};
pub use translation::BasisTranslation;
