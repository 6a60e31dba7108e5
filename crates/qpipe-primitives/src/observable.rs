//! Pauli-sum observables.
//!
//! An [`Observable`] is a real-weighted sum of Pauli strings over virtual
//! qubits. Labels follow the usual convention: the rightmost character acts
//! on qubit 0, so `"XZ"` is `X` on qubit 1 and `Z` on qubit 0.
//!
//! Terms are measured in qubit-wise commuting groups. Two terms fit the same
//! group when, on every qubit both act on, they ask for the same Pauli.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PrimitiveError, PrimitiveResult};

/// A single-qubit Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pauli {
    /// Identity.
    I,
    /// Pauli X.
    X,
    /// Pauli Y.
    Y,
    /// Pauli Z.
    Z,
}

impl TryFrom<char> for Pauli {
    type Error = PrimitiveError;

    fn try_from(c: char) -> PrimitiveResult<Self> {
        match c.to_ascii_uppercase() {
            'I' => Ok(Pauli::I),
            'X' => Ok(Pauli::X),
            'Y' => Ok(Pauli::Y),
            'Z' => Ok(Pauli::Z),
            other => Err(PrimitiveError::InvalidObservable(format!(
                "'{other}' is not a Pauli"
            ))),
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Pauli::I => 'I',
            Pauli::X => 'X',
            Pauli::Y => 'Y',
            Pauli::Z => 'Z',
        };
        write!(f, "{c}")
    }
}

/// One weighted Pauli string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauliTerm {
    /// Real weight.
    pub coeff: f64,
    /// Non-identity factors by qubit.
    pub paulis: BTreeMap<u32, Pauli>,
}

impl PauliTerm {
    /// Parse a label such as `"XIZ"`.
    pub fn from_label(label: &str, coeff: f64) -> PrimitiveResult<Self> {
        let chars: Vec<char> = label.chars().collect();
        let width = chars.len();
        let mut paulis = BTreeMap::new();
        for (pos, c) in chars.into_iter().enumerate() {
            let pauli = Pauli::try_from(c)?;
            if pauli != Pauli::I {
                #[allow(clippy::cast_possible_truncation)]
                paulis.insert((width - 1 - pos) as u32, pauli);
            }
        }
        Ok(Self { coeff, paulis })
    }

    /// True if the term is a multiple of the identity.
    pub fn is_identity(&self) -> bool {
        self.paulis.is_empty()
    }

    /// Highest qubit touched, if any.
    pub fn max_qubit(&self) -> Option<u32> {
        self.paulis.keys().next_back().copied()
    }
}

/// Qubit-wise commuting terms measured with one circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementGroup {
    /// Measurement basis per qubit.
    pub basis: BTreeMap<u32, Pauli>,
    /// Indices into [`Observable::terms`].
    pub terms: Vec<usize>,
}

impl MeasurementGroup {
    fn accepts(&self, term: &PauliTerm) -> bool {
        term.paulis
            .iter()
            .all(|(q, p)| self.basis.get(q).is_none_or(|b| b == p))
    }
}

/// A weighted sum of Pauli strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observable {
    terms: Vec<PauliTerm>,
}

impl Observable {
    /// The zero observable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `coeff * label`.
    pub fn with_term(mut self, label: &str, coeff: f64) -> PrimitiveResult<Self> {
        self.terms.push(PauliTerm::from_label(label, coeff)?);
        Ok(self)
    }

    /// Build from `(label, coeff)` pairs.
    pub fn from_list<'a>(
        terms: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> PrimitiveResult<Self> {
        terms
            .into_iter()
            .try_fold(Self::new(), |obs, (label, coeff)| obs.with_term(label, coeff))
    }

    /// The terms in insertion order.
    pub fn terms(&self) -> &[PauliTerm] {
        &self.terms
    }

    /// Qubits the observable needs, counting from 0.
    pub fn width(&self) -> u32 {
        self.terms
            .iter()
            .filter_map(PauliTerm::max_qubit)
            .max()
            .map_or(0, |q| q + 1)
    }

    /// Sum of identity-term weights.
    pub fn constant(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.is_identity())
            .map(|t| t.coeff)
            .sum()
    }

    /// Greedy qubit-wise commuting grouping of the non-identity terms.
    ///
    /// Each term joins the first group it commutes with, in insertion order.
    pub fn groups(&self) -> Vec<MeasurementGroup> {
        let mut groups: Vec<MeasurementGroup> = Vec::new();
        for (idx, term) in self.terms.iter().enumerate() {
            if term.is_identity() {
                continue;
            }
            match groups.iter_mut().find(|g| g.accepts(term)) {
                Some(group) => {
                    group.basis.extend(term.paulis.iter().map(|(&q, &p)| (q, p)));
                    group.terms.push(idx);
                }
                None => groups.push(MeasurementGroup {
                    basis: term.paulis.clone(),
                    terms: vec![idx],
                }),
            }
        }
        groups
    }
}

impl FromStr for Observable {
    type Err = PrimitiveError;

    /// Parse `"0.5*ZZ + -1.0*XI + IZ"`; a bare label has weight 1.
    fn from_str(s: &str) -> PrimitiveResult<Self> {
        s.split('+')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Self::new(), |obs, part| match part.split_once('*') {
                Some((coeff, label)) => {
                    let coeff: f64 = coeff.trim().parse().map_err(|_| {
                        PrimitiveError::InvalidObservable(format!("bad weight in '{part}'"))
                    })?;
                    obs.with_term(label.trim(), coeff)
                }
                None => obs.with_term(part, 1.0),
            })
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.width();
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}*", term.coeff)?;
            if width == 0 {
                write!(f, "I")?;
            }
            for q in (0..width).rev() {
                write!(f, "{}", term.paulis.get(&q).copied().unwrap_or(Pauli::I))?;
            }
        }
        Ok(())
    }
}
