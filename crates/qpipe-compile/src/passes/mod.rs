//! Built-in compilation passes.
//!
//! Passes are organized into two categories:
//! - [`agnostic`]: passes that need nothing from the device
//! - [`target`]: passes that consult the coupling map, basis or timing

pub mod agnostic;
pub mod target;

pub use agnostic::Validate;
pub use target::{
    BasisTranslation, DynamicalDecoupling, LayoutSelection, LocalOptimization, SabreRouting,
    StochasticRouting,
};
