//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - quantum circuit compilation pipeline",
        style("qpipe").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qpipe-ir          Circuit intermediate representation");
    println!("  qpipe-compile     Layout, routing, translation and optimization");
    println!("  qpipe-hal         Execution backend abstraction");
    println!("  qpipe-primitives  Sampler and estimator");
    println!("  qpipe-adapter-sim Local statevector simulator");
    println!();
    println!("License: {}", style("Apache-2.0").dim());
}
