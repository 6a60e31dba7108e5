//! Parameter expressions for parameterized circuits.
//!
//! Gate angles are affine expressions `c + Σ kᵢ·θᵢ` over named symbols. That
//! form is closed under every transformation the equivalence rules apply
//! (halving, negation, adding π, summing two angles), so circuits can be
//! compiled before their parameters are bound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::{IrError, IrResult};

/// Coefficients below this magnitude are dropped from the symbolic part.
const COEFF_EPSILON: f64 = 1e-15;

/// An affine angle expression: a constant plus weighted symbols.
///
/// Serialized as a bare number when constant, a bare string for a single
/// unit-weight symbol, and `{ "constant": .., "symbols": {..} }` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterRepr", into = "ParameterRepr")]
pub struct ParameterExpression {
    constant: f64,
    symbols: BTreeMap<String, f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ParameterRepr {
    Value(f64),
    Symbol(String),
    Affine {
        #[serde(default)]
        constant: f64,
        #[serde(default)]
        symbols: BTreeMap<String, f64>,
    },
}

impl From<ParameterRepr> for ParameterExpression {
    fn from(repr: ParameterRepr) -> Self {
        match repr {
            ParameterRepr::Value(v) => Self::constant(v),
            ParameterRepr::Symbol(name) => Self::symbol(name),
            ParameterRepr::Affine { constant, symbols } => Self { constant, symbols },
        }
    }
}

impl From<ParameterExpression> for ParameterRepr {
    fn from(expr: ParameterExpression) -> Self {
        if expr.symbols.is_empty() {
            return ParameterRepr::Value(expr.constant);
        }
        if expr.constant == 0.0 && expr.symbols.len() == 1 {
            if let Some((name, coeff)) = expr.symbols.iter().next() {
                if (coeff - 1.0).abs() < COEFF_EPSILON {
                    return ParameterRepr::Symbol(name.clone());
                }
            }
        }
        ParameterRepr::Affine {
            constant: expr.constant,
            symbols: expr.symbols,
        }
    }
}

/// Values for named parameters.
pub type ParameterBindings = BTreeMap<String, f64>;

impl ParameterExpression {
    /// A constant angle.
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            symbols: BTreeMap::new(),
        }
    }

    /// A free symbol with unit weight.
    pub fn symbol(name: impl Into<String>) -> Self {
        let mut symbols = BTreeMap::new();
        symbols.insert(name.into(), 1.0);
        Self {
            constant: 0.0,
            symbols,
        }
    }

    /// The constant π.
    pub fn pi() -> Self {
        Self::constant(std::f64::consts::PI)
    }

    /// True if any symbol remains unbound.
    pub fn is_symbolic(&self) -> bool {
        !self.symbols.is_empty()
    }

    /// The concrete value, if the expression has no free symbols.
    pub fn as_f64(&self) -> Option<f64> {
        if self.is_symbolic() {
            None
        } else {
            Some(self.constant)
        }
    }

    /// Names of the free symbols, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Substitute every symbol present in `bindings`.
    ///
    /// Symbols missing from `bindings` stay free.
    #[must_use]
    pub fn bind(&self, bindings: &ParameterBindings) -> Self {
        let mut out = Self::constant(self.constant);
        for (name, &coeff) in &self.symbols {
            match bindings.get(name) {
                Some(value) => out.constant += coeff * value,
                None => {
                    out.symbols.insert(name.clone(), coeff);
                }
            }
        }
        out
    }

    /// Evaluate, failing on the first unbound symbol.
    pub fn evaluate(&self) -> IrResult<f64> {
        match self.symbols.keys().next() {
            Some(name) => Err(IrError::UnboundParameter(name.clone())),
            None => Ok(self.constant),
        }
    }

    fn scaled(mut self, factor: f64) -> Self {
        self.constant *= factor;
        for coeff in self.symbols.values_mut() {
            *coeff *= factor;
        }
        self.symbols.retain(|_, c| c.abs() > COEFF_EPSILON);
        self
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbols.is_empty() {
            return write!(f, "{}", self.constant);
        }
        let mut first = true;
        for (name, coeff) in &self.symbols {
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            if (coeff - 1.0).abs() < COEFF_EPSILON {
                write!(f, "{name}")?;
            } else {
                write!(f, "{coeff}*{name}")?;
            }
        }
        if self.constant != 0.0 {
            write!(f, " + {}", self.constant)?;
        }
        Ok(())
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::constant(value)
    }
}

impl Add for ParameterExpression {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.constant += rhs.constant;
        for (name, coeff) in rhs.symbols {
            *self.symbols.entry(name).or_insert(0.0) += coeff;
        }
        self.symbols.retain(|_, c| c.abs() > COEFF_EPSILON);
        self
    }
}

impl Add<f64> for ParameterExpression {
    type Output = Self;

    fn add(mut self, rhs: f64) -> Self {
        self.constant += rhs;
        self
    }
}

impl Sub for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Sub<f64> for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self {
        self + (-rhs)
    }
}

impl Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self {
        self.scaled(-1.0)
    }
}

impl Mul<f64> for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scaled(rhs)
    }
}

impl Div<f64> for ParameterExpression {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        self.scaled(1.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_constant_arithmetic() {
        let p = ParameterExpression::constant(1.0) + ParameterExpression::pi();
        assert!((p.as_f64().unwrap() - (1.0 + PI)).abs() < 1e-12);
        let half = ParameterExpression::constant(3.0) / 2.0;
        assert_eq!(half.as_f64(), Some(1.5));
    }

    #[test]
    fn test_symbolic_affine_form() {
        let theta = ParameterExpression::symbol("theta");
        let expr = (theta.clone() / 2.0) + PI;
        assert!(expr.is_symbolic());
        assert_eq!(expr.as_f64(), None);

        let mut bindings = ParameterBindings::new();
        bindings.insert("theta".into(), 1.0);
        let bound = expr.bind(&bindings);
        assert!((bound.as_f64().unwrap() - (0.5 + PI)).abs() < 1e-12);
    }

    #[test]
    fn test_symbols_cancel() {
        let theta = ParameterExpression::symbol("theta");
        let zero = theta.clone() - theta;
        assert!(!zero.is_symbolic());
        assert_eq!(zero.as_f64(), Some(0.0));
    }

    #[test]
    fn test_partial_binding_keeps_free_symbols() {
        let expr = ParameterExpression::symbol("a") + ParameterExpression::symbol("b");
        let mut bindings = ParameterBindings::new();
        bindings.insert("a".into(), 2.0);
        let bound = expr.bind(&bindings);
        assert_eq!(bound.symbols().collect::<Vec<_>>(), vec!["b"]);
        assert!(matches!(
            bound.evaluate(),
            Err(IrError::UnboundParameter(name)) if name == "b"
        ));
    }

    #[test]
    fn test_serde_compact_forms() {
        let c: ParameterExpression = serde_json::from_str("0.25").unwrap();
        assert_eq!(c.as_f64(), Some(0.25));
        let s: ParameterExpression = serde_json::from_str("\"theta\"").unwrap();
        assert_eq!(s, ParameterExpression::symbol("theta"));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"theta\"");

        let affine = ParameterExpression::symbol("theta") / 2.0 + 1.0;
        let json = serde_json::to_string(&affine).unwrap();
        let back: ParameterExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, affine);
    }

    #[test]
    fn test_display() {
        let expr = ParameterExpression::symbol("phi") * 2.0;
        assert_eq!(format!("{expr}"), "2*phi");
        assert_eq!(format!("{}", ParameterExpression::constant(0.5)), "0.5");
    }
}
