//! Run command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use qpipe_adapter_sim::SimulatorBackend;
use qpipe_compile::Pipeline;
use qpipe_primitives::Sampler;

use super::common::{PipelineArgs, load_circuit, load_device, print_distribution};

/// Options for the run command.
pub struct RunOptions<'a> {
    pub input: &'a str,
    pub device: Option<&'a str>,
    pub shots: u32,
    pub seed: Option<u64>,
    pub timeout: Option<u64>,
    pub json: bool,
}

/// Compile (when a device is given) and sample on the local simulator.
pub async fn execute(opts: RunOptions<'_>, args: &PipelineArgs) -> Result<()> {
    let mut circuit = load_circuit(opts.input)?;
    eprintln!(
        "{} Running {} ({} qubits, depth {}) with {} shots",
        style("→").cyan().bold(),
        style(opts.input).green(),
        circuit.num_qubits(),
        circuit.depth(),
        opts.shots
    );

    if let Some(spec) = opts.device {
        let device = load_device(spec)?;
        let pipeline = Pipeline::new(device, args.to_config()?)?;
        let compiled = pipeline
            .compile(&circuit)
            .with_context(|| format!("Failed to compile {}", opts.input))?;
        eprintln!(
            "  Compiled for {}: {} ops, depth {}",
            style(pipeline.device().name()).yellow(),
            compiled.circuit.len(),
            compiled.circuit.depth()
        );
        circuit = compiled.circuit;
    }

    let mut backend = SimulatorBackend::new();
    if let Some(seed) = opts.seed {
        backend = backend.with_seed(seed);
    }
    let mut sampler = Sampler::new(Arc::new(backend)).with_shots(opts.shots);
    if let Some(secs) = opts.timeout {
        sampler = sampler.with_timeout(Duration::from_secs(secs));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Simulating...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let mut results = sampler.run(std::slice::from_ref(&circuit)).await?;
    spinner.finish_and_clear();

    let dist = results
        .pop()
        .context("sampler returned no result")??;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&dist)?);
    } else {
        print_distribution(circuit.name(), &dist);
    }
    Ok(())
}
