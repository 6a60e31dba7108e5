//! Pipeline configuration and the optimization-level policy table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Optimization level, 0 through 3.
///
/// The level is an ordinal into the [`LevelPolicy`] table. Level 0 is a
/// dedicated lighter policy; levels 1 to 3 currently share one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct OptimizationLevel(u8);

impl OptimizationLevel {
    /// Highest supported level.
    pub const MAX: u8 = 3;

    /// The numeric level.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The policy this level selects.
    pub fn policy(self) -> &'static LevelPolicy {
        match self.0 {
            0 => &LEVEL_0,
            _ => &STANDARD,
        }
    }
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        OptimizationLevel(1)
    }
}

impl TryFrom<u8> for OptimizationLevel {
    type Error = CompileError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level > Self::MAX {
            return Err(CompileError::InvalidConfiguration(format!(
                "optimization level {level} out of range 0..={}",
                Self::MAX
            )));
        }
        Ok(OptimizationLevel(level))
    }
}

impl From<OptimizationLevel> for u8 {
    fn from(level: OptimizationLevel) -> Self {
        level.0
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Initial-layout strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMethod {
    /// Virtual qubit i on physical qubit i.
    Trivial,
    /// Subgraph isomorphism of the interaction graph into the coupling map.
    Vf2,
    /// Iterative forward/backward refinement.
    Sabre,
}

impl FromStr for LayoutMethod {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trivial" => Ok(LayoutMethod::Trivial),
            "vf2" | "dense" => Ok(LayoutMethod::Vf2),
            "sabre" => Ok(LayoutMethod::Sabre),
            other => Err(CompileError::InvalidConfiguration(format!(
                "unknown layout method '{other}' (expected trivial, vf2 or sabre)"
            ))),
        }
    }
}

impl fmt::Display for LayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutMethod::Trivial => "trivial",
            LayoutMethod::Vf2 => "vf2",
            LayoutMethod::Sabre => "sabre",
        })
    }
}

/// Routing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    /// Randomized shortest-path swaps with several seeded trials.
    Stochastic,
    /// Front-layer look-ahead heuristic.
    Sabre,
}

impl FromStr for RoutingMethod {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stochastic" => Ok(RoutingMethod::Stochastic),
            "sabre" => Ok(RoutingMethod::Sabre),
            other => Err(CompileError::InvalidConfiguration(format!(
                "unknown routing method '{other}' (expected stochastic or sabre)"
            ))),
        }
    }
}

impl fmt::Display for RoutingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoutingMethod::Stochastic => "stochastic",
            RoutingMethod::Sabre => "sabre",
        })
    }
}

/// Explicit layout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutOverride {
    /// `mapping[v]` is the physical qubit for virtual qubit `v`.
    Mapping(Vec<u32>),
    /// Use this strategy instead of the level default.
    Method(LayoutMethod),
}

/// How shape mismatches are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Apply cheap fixups (complete partial mappings, skip checks on bypass).
    #[default]
    Lenient,
    /// Fail on any shape mismatch.
    Strict,
}

impl FromStr for Strictness {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(Strictness::Lenient),
            "strict" => Ok(Strictness::Strict),
            other => Err(CompileError::InvalidConfiguration(format!(
                "unknown strictness '{other}' (expected lenient or strict)"
            ))),
        }
    }
}

/// Configuration for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Optimization level, default 1.
    pub optimization_level: OptimizationLevel,
    /// Bypass every pass; only check validity.
    pub skip_compilation: bool,
    /// Explicit layout or layout strategy.
    pub layout: Option<LayoutOverride>,
    /// Explicit routing strategy.
    pub routing: Option<RoutingMethod>,
    /// 1.0 exact, 0.0 maximal approximation.
    pub approximation_degree: f64,
    /// Shape-mismatch handling.
    pub strictness: Strictness,
    /// Seed for stochastic routing.
    pub seed: u64,
    /// Router iteration cap per operation.
    pub routing_iteration_factor: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            skip_compilation: false,
            layout: None,
            routing: None,
            approximation_degree: 1.0,
            strictness: Strictness::default(),
            seed: 0,
            routing_iteration_factor: DEFAULT_ROUTING_ITERATION_FACTOR,
        }
    }
}

/// Default router iterations allowed per operation.
pub const DEFAULT_ROUTING_ITERATION_FACTOR: usize = 1000;

impl PipelineConfig {
    /// Set the optimization level.
    pub fn with_optimization_level(mut self, level: u8) -> CompileResult<Self> {
        self.optimization_level = OptimizationLevel::try_from(level)?;
        Ok(self)
    }

    /// Request an explicit layout mapping.
    #[must_use]
    pub fn with_layout_mapping(mut self, mapping: Vec<u32>) -> Self {
        self.layout = Some(LayoutOverride::Mapping(mapping));
        self
    }

    /// Request a layout strategy.
    #[must_use]
    pub fn with_layout_method(mut self, method: LayoutMethod) -> Self {
        self.layout = Some(LayoutOverride::Method(method));
        self
    }

    /// Request a routing strategy.
    #[must_use]
    pub fn with_routing(mut self, method: RoutingMethod) -> Self {
        self.routing = Some(method);
        self
    }

    /// Set the strictness mode.
    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Bypass compilation.
    #[must_use]
    pub fn with_skip_compilation(mut self, skip: bool) -> Self {
        self.skip_compilation = skip;
        self
    }

    /// Set the approximation degree.
    #[must_use]
    pub fn with_approximation_degree(mut self, degree: f64) -> Self {
        self.approximation_degree = degree;
        self
    }

    /// Set the stochastic-routing seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load from YAML.
    pub fn from_yaml(text: &str) -> CompileResult<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| CompileError::InvalidConfiguration(format!("pipeline YAML: {e}")))
    }

    /// Reject values no pipeline can run with.
    pub fn validate(&self) -> CompileResult<()> {
        if !(0.0..=1.0).contains(&self.approximation_degree) {
            return Err(CompileError::InvalidConfiguration(format!(
                "approximation degree {} outside [0, 1]",
                self.approximation_degree
            )));
        }
        Ok(())
    }

    /// Layout strategy after applying the override.
    pub fn layout_method(&self) -> LayoutMethod {
        match &self.layout {
            Some(LayoutOverride::Method(m)) => *m,
            _ => self.optimization_level.policy().layout,
        }
    }

    /// Routing strategy after applying the override.
    pub fn routing_method(&self) -> RoutingMethod {
        self.routing
            .unwrap_or(self.optimization_level.policy().routing)
    }
}

/// Per-level strategy selection and search budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPolicy {
    /// Policy name, for logs.
    pub name: &'static str,
    /// Default layout strategy.
    pub layout: LayoutMethod,
    /// Keep the trivial layout when it already needs no swaps.
    pub prefer_perfect_trivial: bool,
    /// VF2 search-state budget.
    pub vf2_call_limit: usize,
    /// VF2 solutions scored when error weights are present.
    pub vf2_max_solutions: usize,
    /// Forward/backward rounds for sabre layout.
    pub sabre_layout_rounds: usize,
    /// Default routing strategy.
    pub routing: RoutingMethod,
    /// Size of the sabre look-ahead window.
    pub lookahead_size: usize,
    /// Weight of the look-ahead term.
    pub lookahead_weight: f64,
    /// Stochastic-swap trials per blocked gate.
    pub stochastic_trials: usize,
    /// Run the local optimizer.
    pub optimize: bool,
    /// Run dynamical decoupling.
    pub dynamical_decoupling: bool,
}

/// Level 0: trivial layout, stochastic routing, translation only.
pub static LEVEL_0: LevelPolicy = LevelPolicy {
    name: "level0",
    layout: LayoutMethod::Trivial,
    prefer_perfect_trivial: false,
    vf2_call_limit: 0,
    vf2_max_solutions: 0,
    sabre_layout_rounds: 0,
    routing: RoutingMethod::Stochastic,
    lookahead_size: 0,
    lookahead_weight: 0.0,
    stochastic_trials: 8,
    optimize: false,
    dynamical_decoupling: false,
};

/// Levels 1 to 3.
pub static STANDARD: LevelPolicy = LevelPolicy {
    name: "standard",
    layout: LayoutMethod::Vf2,
    prefer_perfect_trivial: true,
    vf2_call_limit: 30_000,
    vf2_max_solutions: 16,
    sabre_layout_rounds: 4,
    routing: RoutingMethod::Sabre,
    lookahead_size: 20,
    lookahead_weight: 0.5,
    stochastic_trials: 16,
    optimize: true,
    dynamical_decoupling: true,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert!(OptimizationLevel::try_from(3u8).is_ok());
        assert!(matches!(
            OptimizationLevel::try_from(4u8),
            Err(CompileError::InvalidConfiguration(_))
        ));
        assert_eq!(OptimizationLevel::default().get(), 1);
    }

    #[test]
    fn test_levels_share_standard_policy() {
        let level = |n: u8| OptimizationLevel::try_from(n).unwrap().policy();
        assert_eq!(level(0).name, "level0");
        assert_eq!(level(1), level(2));
        assert_eq!(level(1), level(3));
        assert!(!level(0).optimize);
        assert!(level(1).dynamical_decoupling);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("sabre".parse::<LayoutMethod>().unwrap(), LayoutMethod::Sabre);
        assert_eq!("dense".parse::<LayoutMethod>().unwrap(), LayoutMethod::Vf2);
        assert!("noise".parse::<LayoutMethod>().is_err());
        assert_eq!(
            "stochastic".parse::<RoutingMethod>().unwrap(),
            RoutingMethod::Stochastic
        );
        assert!("basic".parse::<RoutingMethod>().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = PipelineConfig::default();
        assert_eq!(config.layout_method(), LayoutMethod::Vf2);
        assert_eq!(config.routing_method(), RoutingMethod::Sabre);

        let config = PipelineConfig::default()
            .with_layout_method(LayoutMethod::Trivial)
            .with_routing(RoutingMethod::Stochastic);
        assert_eq!(config.layout_method(), LayoutMethod::Trivial);
        assert_eq!(config.routing_method(), RoutingMethod::Stochastic);
    }

    #[test]
    fn test_yaml_config() {
        let yaml = "
optimization_level: 0
layout: [2, 0, 1]
routing: sabre
strictness: strict
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.optimization_level.get(), 0);
        assert_eq!(config.layout, Some(LayoutOverride::Mapping(vec![2, 0, 1])));
        assert_eq!(config.routing, Some(RoutingMethod::Sabre));
        assert_eq!(config.strictness, Strictness::Strict);
        assert_eq!(config.approximation_degree, 1.0);

        let method = PipelineConfig::from_yaml("layout: vf2").unwrap();
        assert_eq!(method.layout, Some(LayoutOverride::Method(LayoutMethod::Vf2)));

        assert!(PipelineConfig::from_yaml("optimization_level: 7").is_err());
        assert!(PipelineConfig::from_yaml("layout_method: sabre").is_err());
    }

    #[test]
    fn test_validate_degree() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(
            PipelineConfig::default()
                .with_approximation_degree(1.5)
                .validate()
                .is_err()
        );
    }
}
