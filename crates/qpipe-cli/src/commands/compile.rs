//! Compile command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use qpipe_compile::{CompiledCircuit, Pipeline};

use super::common::{PipelineArgs, load_circuit, load_device};

/// Execute the compile command.
///
/// One input writes to `output` (a file) or stdout. Several inputs compile in
/// parallel and write `<stem>.compiled.json` into `output` (a directory) or
/// next to each input.
pub fn execute(
    inputs: &[String],
    device: &str,
    output: Option<&str>,
    args: &PipelineArgs,
) -> Result<()> {
    let device = load_device(device)?;
    let config = args.to_config()?;
    eprintln!(
        "{} Compiling {} circuit(s) for {} at {}",
        style("→").cyan().bold(),
        inputs.len(),
        style(device.name()).yellow(),
        config.optimization_level
    );
    let pipeline = Pipeline::new(device, config)?;

    let circuits = inputs
        .iter()
        .map(|path| load_circuit(path))
        .collect::<Result<Vec<_>>>()?;

    if let [circuit] = circuits.as_slice() {
        let compiled = pipeline
            .compile(circuit)
            .with_context(|| format!("Failed to compile {}", inputs[0]))?;
        print_summary(&inputs[0], &compiled);
        let json = serde_json::to_string_pretty(&compiled)?;
        match output {
            Some(path) => {
                fs::write(path, json).with_context(|| format!("Failed to write {path}"))?;
                eprintln!("  Output: {}", style(path).green());
            }
            None => println!("{json}"),
        }
        return Ok(());
    }

    let pb = ProgressBar::new(circuits.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    let results: Vec<_> = circuits
        .par_iter()
        .map(|circuit| {
            let result = pipeline.compile(circuit);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut failures = 0;
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(compiled) => {
                print_summary(input, &compiled);
                let path = output_path(input, output);
                fs::write(&path, serde_json::to_string_pretty(&compiled)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote {}", path.display());
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", style("✗").red().bold(), input, e);
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} circuits failed to compile", inputs.len());
    }
    Ok(())
}

fn output_path(input: &str, dir: Option<&str>) -> PathBuf {
    let p = Path::new(input);
    let stem = p.file_stem().unwrap_or_default().to_string_lossy();
    let file = format!("{stem}.compiled.json");
    match dir {
        Some(dir) => Path::new(dir).join(file),
        None => p.with_file_name(file),
    }
}

fn print_summary(input: &str, compiled: &CompiledCircuit) {
    let report = &compiled.report;
    eprintln!(
        "{} {}: {} ops, depth {}, {} swaps{}",
        style("✓").green().bold(),
        style(input).green(),
        compiled.circuit.len(),
        compiled.circuit.depth(),
        report.swaps_inserted,
        if report.skipped { " (skipped)" } else { "" }
    );
    if let Some(method) = report.layout_method {
        eprintln!("  Layout: {method} {:?}", compiled.initial_layout.mapping());
    }
    if report.dd_sequences > 0 {
        eprintln!("  Decoupling sequences: {}", report.dd_sequences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path("dir/bell.json", None),
            PathBuf::from("dir/bell.compiled.json")
        );
        assert_eq!(
            output_path("dir/bell.json", Some("out")),
            PathBuf::from("out/bell.compiled.json")
        );
    }
}
