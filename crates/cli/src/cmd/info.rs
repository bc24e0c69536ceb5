use anyhow::Result;

use cwasm_lib::CompilerConfig;

use crate::output::{OutputFormat, emit_json, field};

pub fn cmd_info(config: &CompilerConfig, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return emit_json(config);
  }

  println!("Toolchain:");
  field("Compiler", config.compiler.display());
  field("Flags", config.cflags.join(" "));
  field("Includes", config.include_dir.display());
  field("Helper", config.helper_path().display());
  field("Build dir", config.build_dir.display());
  Ok(())
}
