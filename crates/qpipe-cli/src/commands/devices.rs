//! Devices command implementation.

use anyhow::Result;
use console::style;

use super::common::load_device;

const TOPOLOGIES: &[(&str, &str)] = &[
    ("linear:<n>", "qubits on a line"),
    ("ring:<n>", "line closed into a cycle"),
    ("grid:<r>x<c>", "rectangular lattice"),
    ("full:<n>", "all-to-all"),
    ("star:<n>", "qubit 0 coupled to every other qubit"),
];

const BASES: &[(&str, &str)] = &[
    ("ibm", "rz sx x cx (default)"),
    ("heron", "rz sx x cz"),
    ("iqm", "prx cz"),
];

/// List presets, or describe one device.
pub fn execute(spec: Option<&str>) -> Result<()> {
    if let Some(spec) = spec {
        let device = load_device(spec)?;
        println!("{}", style(device.name()).cyan().bold());
        println!("  Qubits:   {}", device.num_qubits());
        println!("  Basis:    {}", device.basis().gates().join(" "));
        println!("  Edges:    {}", device.coupling_map().edges().len());
        match device.diameter() {
            Some(d) => println!("  Diameter: {d}"),
            None => println!("  Diameter: {}", style("disconnected").red()),
        }
        if device.has_durations() {
            println!("  Durations: yes");
        }
        return Ok(());
    }

    println!("{}", style("Device presets").bold());
    println!("  Format: <topology>:<size>[:<basis>], e.g. grid:3x4:heron\n");
    println!("  Topologies:");
    for (name, what) in TOPOLOGIES {
        println!("    {:<14} {}", style(name).cyan(), what);
    }
    println!("\n  Bases:");
    for (name, gates) in BASES {
        println!("    {:<14} {}", style(name).cyan(), gates);
    }
    println!("\n  A YAML or JSON device file can be passed anywhere a preset is accepted.");
    Ok(())
}
