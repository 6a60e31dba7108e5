//! Target-agnostic compilation passes.
//!
//! These passes look only at the circuit. They are safe to run before a
//! layout exists.

pub mod validation;

pub use validation::Validate;
