//! Implementation of the `cwasm build` command.
//!
//! Compiles one C file and writes the resulting module next to it (or to `--out`).

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use cwasm_lib::{CompilerConfig, WasiCompiler};

use crate::output::{OutputFormat, emit_json, field, human_elapsed, human_size, report_done, report_rejected};

#[derive(Serialize)]
struct BuildSummary {
  output: PathBuf,
  size: usize,
  duration_ms: u128,
}

/// Execute the build command.
///
/// Compiler diagnostics for rejected source go to stderr and exit with status 1.
/// Toolchain or filesystem faults are returned as errors naming the failed phase.
pub fn cmd_build(config: CompilerConfig, source: &Path, out: Option<&Path>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let code = std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source.display()))?;
  let out = out.map(Path::to_path_buf).unwrap_or_else(|| source.with_extension("wasm"));

  let compiler = WasiCompiler::new(config);
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let bytes = match rt.block_on(compiler.build_c(&code)) {
    Ok(bytes) => bytes,
    Err(err) if err.is_input_error() => {
      report_rejected(&format!("Compilation of {} failed", source.display()));
      if let Some(diagnostics) = err.diagnostics() {
        eprintln!("{}", diagnostics.trim_end());
      }
      std::process::exit(1);
    }
    Err(err) => {
      let phase = err.phase();
      return Err(err).with_context(|| format!("Build failed during {} phase", phase));
    }
  };

  std::fs::write(&out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;
  let out = dunce::canonicalize(&out).unwrap_or(out);
  info!(path = %out.display(), size = bytes.len(), "module written");

  if output.is_json() {
    emit_json(&BuildSummary {
      output: out,
      size: bytes.len(),
      duration_ms: start.elapsed().as_millis(),
    })?;
  } else {
    report_done("Build complete!");
    field("Output", out.display());
    field("Size", human_size(bytes.len() as u64));
    field("Duration", human_elapsed(start.elapsed()));
  }

  Ok(())
}
