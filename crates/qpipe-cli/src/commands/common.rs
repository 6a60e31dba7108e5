//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;

use qpipe_compile::{Device, LayoutMethod, PipelineConfig, RoutingMethod, Strictness};
use qpipe_ir::Circuit;
use qpipe_primitives::QuasiDistribution;

/// Pipeline options shared by `compile` and `run`.
///
/// Flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Optimization level (0-3)
    #[arg(short = 'O', long = "optimization-level")]
    pub optimization_level: Option<u8>,

    /// Layout strategy (trivial, vf2, sabre) or explicit mapping such as 2,0,1
    #[arg(long)]
    pub layout: Option<String>,

    /// Routing strategy (stochastic, sabre)
    #[arg(long)]
    pub routing: Option<RoutingMethod>,

    /// Approximation degree in [0, 1]
    #[arg(long)]
    pub approximation: Option<f64>,

    /// Fail on shape mismatches instead of fixing them up
    #[arg(long)]
    pub strict: bool,

    /// Skip compilation; only check the circuit fits the device
    #[arg(long)]
    pub skip: bool,

    /// Seed for stochastic routing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pipeline configuration file (YAML)
    #[arg(long)]
    pub config: Option<String>,
}

impl PipelineArgs {
    /// Resolve the configuration: file first, then flags.
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {path}"))?;
                PipelineConfig::from_yaml(&text)?
            }
            None => PipelineConfig::default(),
        };

        if let Some(level) = self.optimization_level {
            config = config.with_optimization_level(level)?;
        }
        if let Some(layout) = &self.layout {
            config = match parse_mapping(layout)? {
                Some(mapping) => config.with_layout_mapping(mapping),
                None => config.with_layout_method(layout.parse::<LayoutMethod>()?),
            };
        }
        if let Some(routing) = self.routing {
            config = config.with_routing(routing);
        }
        if let Some(degree) = self.approximation {
            config = config.with_approximation_degree(degree);
        }
        if self.strict {
            config = config.with_strictness(Strictness::Strict);
        }
        if self.skip {
            config = config.with_skip_compilation(true);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

/// `Some(mapping)` for a comma-separated list of physical qubits.
fn parse_mapping(text: &str) -> Result<Option<Vec<u32>>> {
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(None);
    }
    text.split(',')
        .map(|p| {
            p.trim()
                .parse::<u32>()
                .with_context(|| format!("Bad layout mapping entry '{p}'"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Load a circuit from a JSON file.
pub fn load_circuit(path: &str) -> Result<Circuit> {
    if !Path::new(path).exists() {
        bail!("File not found: {path}");
    }
    let source = fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    serde_json::from_str(&source).with_context(|| format!("Invalid circuit JSON in {path}"))
}

/// Load a device from a YAML/JSON file, or build a preset such as `linear:5`.
pub fn load_device(spec: &str) -> Result<Arc<Device>> {
    let path = Path::new(spec);
    let device = if path.is_file() {
        let text =
            fs::read_to_string(path).with_context(|| format!("Failed to read device: {spec}"))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Device::from_json(&text)?,
            _ => Device::from_yaml(&text)?,
        }
    } else {
        Device::preset(spec).with_context(|| format!("'{spec}' is neither a file nor a preset"))?
    };
    Ok(Arc::new(device))
}

/// Print a distribution as a bar table.
pub fn print_distribution(name: &str, dist: &QuasiDistribution) {
    println!(
        "\n{} {} ({} shots):",
        style("✓").green().bold(),
        style(name).cyan(),
        dist.shots()
    );

    let mut entries: Vec<(&str, f64)> = dist.iter().collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (bitstring, prob) in entries.iter().take(16) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bar_len = (prob * 50.0).round() as usize;
        println!(
            "  {}: {:>7.4} {}",
            style(bitstring).cyan(),
            prob,
            style("█".repeat(bar_len)).green()
        );
    }
    if entries.len() > 16 {
        println!("  ... and {} more outcomes", entries.len() - 16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        assert_eq!(parse_mapping("2,0, 1").unwrap(), Some(vec![2, 0, 1]));
        assert_eq!(parse_mapping("sabre").unwrap(), None);
        assert!(parse_mapping("1,x").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = PipelineArgs {
            optimization_level: Some(0),
            layout: Some("1,0".into()),
            strict: true,
            ..PipelineArgs::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.optimization_level.get(), 0);
        assert_eq!(config.strictness, Strictness::Strict);
        assert_eq!(
            config.layout,
            Some(qpipe_compile::LayoutOverride::Mapping(vec![1, 0]))
        );
    }

    #[test]
    fn test_bad_level_rejected() {
        let args = PipelineArgs {
            optimization_level: Some(7),
            ..PipelineArgs::default()
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_load_preset_device() {
        let device = load_device("ring:6:heron").unwrap();
        assert_eq!(device.num_qubits(), 6);
        assert!(load_device("blob:3").is_err());
    }
}
