//! qpipe command-line interface.
//!
//! ```text
//! qpipe compile bell.json --device linear:5 -O 2 -o bell.compiled.json
//! qpipe run bell.json --device grid:3x3:heron --shots 4096
//! qpipe devices [ring:8:iqm]
//! qpipe version
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::PipelineArgs;
use commands::run::RunOptions;
use commands::{compile, devices, run, version};

/// qpipe - compile quantum circuits for constrained devices and sample them
#[derive(Parser)]
#[command(name = "qpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile circuits (JSON) for a device
    Compile {
        /// Input circuit files
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Device file (YAML/JSON) or preset such as linear:5 or grid:3x3:heron
        #[arg(short, long)]
        device: String,

        /// Output file (one input) or directory (several inputs)
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Compile a circuit and sample it on the local simulator
    Run {
        /// Input circuit file
        input: String,

        /// Device to compile for; runs the circuit as-is when omitted
        #[arg(short, long)]
        device: Option<String>,

        /// Number of shots
        #[arg(short, long, default_value = "1024")]
        shots: u32,

        /// Simulator seed
        #[arg(long = "sim-seed")]
        sim_seed: Option<u64>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the distribution as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// List device presets, or describe one device
    Devices {
        /// Device file or preset to describe
        device: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Compile {
            inputs,
            device,
            output,
            pipeline,
        } => compile::execute(&inputs, &device, output.as_deref(), &pipeline),

        Commands::Run {
            input,
            device,
            shots,
            sim_seed,
            timeout,
            json,
            pipeline,
        } => {
            let opts = RunOptions {
                input: &input,
                device: device.as_deref(),
                shots,
                seed: sim_seed,
                timeout,
                json,
            };
            run::execute(opts, &pipeline).await
        }

        Commands::Devices { device } => devices::execute(device.as_deref()),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
