mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cwasm_lib::CompilerConfig;

use crate::output::OutputFormat;

/// cwasm - compile C source to WASI WebAssembly modules
#[derive(Parser)]
#[command(name = "cwasm")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(flatten)]
  toolchain: ToolchainArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct ToolchainArgs {
  /// JSON config file (fields: wasi_sdk, compiler, cflags, include_dir, helper_source, build_dir)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// wasi-sdk installation root
  #[arg(long, global = true)]
  sdk: Option<PathBuf>,

  /// Directory with support headers and the helper source
  #[arg(long, global = true)]
  include_dir: Option<PathBuf>,

  /// Directory for transient build files
  #[arg(long, global = true)]
  build_dir: Option<PathBuf>,
}

impl ToolchainArgs {
  /// Resolve the configuration: file (or environment defaults), then flags.
  fn resolve(&self) -> Result<CompilerConfig> {
    let mut config = match &self.config {
      Some(path) => CompilerConfig::load(path).context("Failed to load config")?,
      None => CompilerConfig::from_env(),
    };

    if let Some(sdk) = &self.sdk {
      let derived = CompilerConfig::from_sdk(sdk, &config.include_dir, &config.build_dir);
      config.compiler = derived.compiler;
      config.cflags = derived.cflags;
    }
    if let Some(include_dir) = &self.include_dir {
      config.include_dir = include_dir.clone();
    }
    if let Some(build_dir) = &self.build_dir {
      config.build_dir = build_dir.clone();
    }

    Ok(config)
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a C source file to a WebAssembly module
  Build {
    /// Path to the C source file
    source: PathBuf,

    /// Output path (default: SOURCE with a .wasm extension)
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,
  },

  /// Remove transient files left behind by failed builds
  Gc {
    /// Only remove files older than this (e.g. "30m", "2h")
    #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
    older_than: Duration,

    /// Show what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Show the resolved toolchain configuration
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.toolchain.resolve()?;

  match cli.command {
    Commands::Build { source, out } => cmd::cmd_build(config, &source, out.as_deref(), cli.output),
    Commands::Gc { older_than, dry_run } => cmd::cmd_gc(&config, older_than, dry_run, cli.output),
    Commands::Info => cmd::cmd_info(&config, cli.output),
  }
}
