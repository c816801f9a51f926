//! stcodec command-line tool
//!
//! Inspect, verify and rewrite safetensors files without loading whole
//! models into memory.
//!
//! ```bash
//! stcodec inspect model.safetensors
//! stcodec inspect model.safetensors --json
//! stcodec verify model.safetensors
//! stcodec extract model.safetensors --tensor lm_head.weight --output lm_head.bin
//! stcodec repack model.safetensors canonical.safetensors --meta format=pt
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stcodec_cli::commands::{ExtractCommand, InspectCommand, RepackCommand, VerifyCommand};
use stcodec_cli::{exit, settings};
use tracing_subscriber::EnvFilter;

/// Inspect, verify and rewrite safetensors files
#[derive(Parser, Debug)]
#[command(name = "stcodec")]
#[command(version)]
struct Cli {
    /// Read configuration file (JSON)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Largest accepted JSON header length in bytes
    #[arg(long, value_name = "BYTES", global = true)]
    header_limit: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print metadata and the tensor table without reading tensor data
    Inspect(InspectCommand),

    /// Read every tensor and check the file end to end
    Verify(VerifyCommand),

    /// Write one tensor's raw bytes to a file
    Extract(ExtractCommand),

    /// Rewrite a file in canonical order, optionally editing metadata
    Repack(RepackCommand),
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(exit::code_for(&e));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = settings::resolve(cli.config.as_deref(), cli.header_limit)?;
    match &cli.command {
        Commands::Inspect(cmd) => cmd.execute(&config),
        Commands::Verify(cmd) => cmd.execute(&config),
        Commands::Extract(cmd) => cmd.execute(&config),
        Commands::Repack(cmd) => cmd.execute(&config),
    }
}

/// Logs go to stderr so `--json` output stays machine readable.
fn setup_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
