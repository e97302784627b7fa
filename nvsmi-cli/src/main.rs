use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use nvsmi_query::Nvsmi;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use nvsmi_cli::commands::{ls, ps};
use nvsmi_cli::config;
use nvsmi_cli::utils::gpu_selector::resolve_nvidia_smi;

/// A (user-)friendly interface for nvidia-smi
#[derive(Parser)]
#[command(name = "nvsmi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose mode (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// nvidia-smi binary to use instead of the one on PATH
    #[arg(long, global = true, env = "NVSMI_NVIDIA_SMI")]
    nvidia_smi: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available GPUs
    Ls(ls::LsArgs),

    /// Examine the process of a gpu
    Ps(ps::PsArgs),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Records go to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(verbose > 2)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Some(config_path) = &cli.config {
        config::set_config_path(config_path);
    }
    let config = config::load_config()?;

    let source = resolve_nvidia_smi(cli.nvidia_smi, config.nvidia_smi.clone())?;
    let nvsmi = Nvsmi::new(source);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Ls(args) => ls::execute(args, &nvsmi, &config.ls, &mut out)?,
        Commands::Ps(args) => ps::execute(args, &nvsmi, &mut out)?,
    }

    Ok(())
}
