//! Test utilities for cwasm-lib.
//!
//! Provides a stand-in for clang so pipeline tests run without a wasi-sdk.

use std::path::{Path, PathBuf};

use crate::config::{CompilerConfig, DEFAULT_HELPER_SOURCE};
use crate::id::IdGenerator;

/// Shell script imitating clang's argument contract.
///
/// The staged source is the argument before `-Wl,--export-all` and the
/// artifact follows `-o`. Markers inside the source select the behaviour:
/// - `main( {`: syntax error on stderr, exit 1
/// - `emit:chatter`: prints to stdout
/// - `emit:none`: exits 0 without writing the artifact
/// - `emit:elf`: writes an ELF header instead of a wasm module
///
/// Otherwise it writes the wasm preamble followed by the source text.
const FAKE_CLANG: &str = r#"
touch "$CWASM_FAKE_MARKER"
src=""
dst=""
helper=""
prev=""
for arg in "$@"; do
  case "$arg" in
    -Wl,--export-all) src="$prev" ;;
    *.c) [ -z "$helper" ] && helper="$arg" ;;
  esac
  if [ "$prev" = "-o" ]; then dst="$arg"; fi
  prev="$arg"
done
if [ ! -f "$helper" ]; then
  echo "clang: error: no such file or directory: '$helper'" >&2
  exit 1
fi
if grep -qF 'main( {' "$src"; then
  echo "$src:1:10: error: expected ')'" >&2
  exit 1
fi
if grep -qF 'emit:chatter' "$src"; then echo "note: chatter"; fi
if grep -qF 'emit:none' "$src"; then exit 0; fi
if grep -qF 'emit:elf' "$src"; then
  printf '\177ELF\002\001\001\000' > "$dst"
  exit 0
fi
printf '\000asm\001\000\000\000' > "$dst"
cat "$src" >> "$dst"
"#;

/// A fake toolchain laid out under a temporary directory.
pub struct FakeCompiler {
  pub script: PathBuf,
  pub include_dir: PathBuf,
  pub build_dir: PathBuf,
  pub marker: PathBuf,
}

impl FakeCompiler {
  /// Write the script, helper source and an empty build directory under `root`.
  pub fn install(root: &Path) -> Self {
    let script = root.join("fake-clang.sh");
    let include_dir = root.join("include");
    let build_dir = root.join("build");
    std::fs::write(&script, FAKE_CLANG).unwrap();
    std::fs::create_dir_all(&include_dir).unwrap();
    std::fs::write(include_dir.join(DEFAULT_HELPER_SOURCE), "/* helper */\n").unwrap();
    std::fs::create_dir_all(&build_dir).unwrap();

    FakeCompiler {
      script,
      include_dir,
      build_dir,
      marker: root.join("invoked"),
    }
  }

  /// Configuration running the script through `/bin/sh`.
  ///
  /// The script path rides in front of the base flags, so the remaining
  /// arguments arrive exactly as clang would receive them.
  pub fn config(&self) -> CompilerConfig {
    CompilerConfig {
      compiler: PathBuf::from("/bin/sh"),
      cflags: vec![
        "-c".to_string(),
        format!("CWASM_FAKE_MARKER='{}'; . '{}'", self.marker.display(), self.script.display()),
        "fake-clang".to_string(),
        "--sysroot=/fake/sysroot".to_string(),
      ],
      include_dir: self.include_dir.clone(),
      helper_source: DEFAULT_HELPER_SOURCE.to_string(),
      build_dir: self.build_dir.clone(),
    }
  }

  pub fn was_invoked(&self) -> bool {
    self.marker.exists()
  }
}

/// Always hands out the same identifier.
pub struct FixedIds(pub String);

impl IdGenerator for FixedIds {
  fn next_id(&self) -> String {
    self.0.clone()
  }
}

/// Transient build files (`.c`/`.wasm`) left in `dir`.
pub fn residue(dir: &Path) -> Vec<PathBuf> {
  std::fs::read_dir(dir)
    .unwrap()
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("c") | Some("wasm")))
    .collect()
}
