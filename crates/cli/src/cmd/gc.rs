use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use cwasm_lib::CompilerConfig;
use cwasm_lib::sweep::sweep_residue;

use crate::output::{OutputFormat, emit_json, field, human_elapsed, human_size, report_done, report_note};

pub fn cmd_gc(config: &CompilerConfig, older_than: Duration, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let result = sweep_residue(&config.build_dir, older_than, dry_run).context("Failed to sweep build directory")?;

  if output.is_json() {
    emit_json(&result)?;
  } else {
    if dry_run {
      report_note("Dry run - no changes made");
    } else {
      report_done("Build residue collected!");
    }
    field("Files scanned", result.stats.scanned);
    field("Files removed", result.stats.deleted);
    field("Space freed", human_size(result.stats.bytes_freed));
    field("Duration", human_elapsed(start.elapsed()));
  }

  Ok(())
}
