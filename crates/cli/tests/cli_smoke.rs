//! CLI smoke tests for cwasm.
//!
//! Builds run against a shell script standing in for clang, so these tests
//! need no wasi-sdk.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the cwasm binary.
fn cwasm_cmd() -> Command {
  cargo_bin_cmd!("cwasm")
}

/// Stand-in for clang: rejects `main( {`, otherwise writes a wasm preamble to the `-o` path.
const FAKE_CLANG: &str = r#"
src=""
dst=""
prev=""
for arg in "$@"; do
  case "$arg" in
    -Wl,--export-all) src="$prev" ;;
  esac
  if [ "$prev" = "-o" ]; then dst="$arg"; fi
  prev="$arg"
done
if grep -qF 'main( {' "$src"; then
  echo "$src:1:10: error: expected ')'" >&2
  exit 1
fi
printf '\000asm\001\000\000\000' > "$dst"
"#;

/// Isolated toolchain, build directory and config file.
struct TestEnv {
  temp: TempDir,
  config_path: PathBuf,
}

impl TestEnv {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("fake-clang.sh");
    let include_dir = temp.path().join("include");
    std::fs::write(&script, FAKE_CLANG).unwrap();
    std::fs::create_dir_all(&include_dir).unwrap();
    std::fs::write(include_dir.join("cJSON.c"), "").unwrap();
    std::fs::create_dir_all(temp.path().join("build")).unwrap();

    let config = serde_json::json!({
      "compiler": "/bin/sh",
      "cflags": ["-c", format!(". '{}'", script.display()), "fake-clang"],
      "include_dir": include_dir,
      "build_dir": temp.path().join("build"),
    });
    let config_path = temp.path().join("cwasm.json");
    std::fs::write(&config_path, config.to_string()).unwrap();

    Self { temp, config_path }
  }

  fn write_source(&self, name: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
  }

  fn build_dir(&self) -> PathBuf {
    self.temp.path().join("build")
  }

  fn cmd(&self) -> Command {
    let mut cmd = cwasm_cmd();
    cmd.arg("--config").arg(&self.config_path);
    cmd
  }
}

fn entries(dir: &Path) -> usize {
  std::fs::read_dir(dir).unwrap().count()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cwasm_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cwasm_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("cwasm"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "gc", "info"] {
    cwasm_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// build
// =============================================================================

#[cfg(unix)]
#[test]
fn build_writes_module_next_to_source() {
  let env = TestEnv::new();
  let source = env.write_source("hello.c", "int main(void) { return 0; }\n");

  env
    .cmd()
    .arg("build")
    .arg(&source)
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete"));

  let module = std::fs::read(source.with_extension("wasm")).unwrap();
  assert_eq!(&module[0..4], b"\0asm");
  assert_eq!(entries(&env.build_dir()), 0);
}

#[cfg(unix)]
#[test]
fn build_honors_out_flag_and_json_output() {
  let env = TestEnv::new();
  let source = env.write_source("hello.c", "int main(void) { return 0; }\n");
  let out = env.temp.path().join("custom.wasm");

  env
    .cmd()
    .args(["--output", "json", "build"])
    .arg(&source)
    .arg("-o")
    .arg(&out)
    .assert()
    .success()
    .stdout(predicate::str::contains("\"size\": 8"));

  assert!(out.exists());
}

#[cfg(unix)]
#[test]
fn build_reports_compiler_diagnostics() {
  let env = TestEnv::new();
  let source = env.write_source("broken.c", "int main( { return 0; }");

  env
    .cmd()
    .arg("build")
    .arg(&source)
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error: expected ')'"));

  assert!(!source.with_extension("wasm").exists());
}

#[test]
fn build_missing_source_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("build")
    .arg(env.temp.path().join("missing.c"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn build_with_missing_compiler_names_phase() {
  let env = TestEnv::new();
  let source = env.write_source("hello.c", "int main(void) { return 0; }\n");

  env
    .cmd()
    .arg("--sdk")
    .arg(env.temp.path().join("no-sdk"))
    .arg("build")
    .arg(&source)
    .assert()
    .failure()
    .stderr(predicate::str::contains("compile phase"));
}

// =============================================================================
// gc
// =============================================================================

#[test]
fn gc_removes_residue() {
  let env = TestEnv::new();
  let residue = env.build_dir().join("0a1b2c3d_0a1b_4c3d_8e9f_0a1b2c3d4e5f.c");
  std::fs::write(&residue, "int x;").unwrap();

  env
    .cmd()
    .args(["gc", "--older-than", "0s"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Files removed: 1"));

  assert!(!residue.exists());
}

#[test]
fn gc_dry_run_keeps_files() {
  let env = TestEnv::new();
  let residue = env.build_dir().join("0a1b2c3d_0a1b_4c3d_8e9f_0a1b2c3d4e5f.wasm");
  std::fs::write(&residue, "").unwrap();

  env
    .cmd()
    .args(["gc", "--older-than", "0s", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));

  assert!(residue.exists());
}

#[test]
fn gc_older_than_accepts_durations() {
  let env = TestEnv::new();
  let residue = env.build_dir().join("0a1b2c3d_0a1b_4c3d_8e9f_0a1b2c3d4e5f.c");
  std::fs::write(&residue, "int x;").unwrap();

  env
    .cmd()
    .args(["gc", "--older-than", "2h"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Files removed: 0"));

  assert!(residue.exists());

  env.cmd().args(["gc", "--older-than", "soon"]).assert().failure();
}

// =============================================================================
// info
// =============================================================================

#[test]
fn info_shows_resolved_config() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiler"))
    .stdout(predicate::str::contains("/bin/sh"));
}

#[test]
fn info_sdk_flag_derives_compiler() {
  cwasm_cmd()
    .args(["--sdk", "/opt/custom-sdk", "--output", "json", "info"])
    .assert()
    .success()
    .stdout(predicate::str::contains("/opt/custom-sdk/bin/clang"))
    .stdout(predicate::str::contains("--sysroot=/opt/custom-sdk/share/wasi-sysroot"));
}

#[test]
#[serial]
fn info_reads_environment_overrides() {
  let temp = TempDir::new().unwrap();
  let build_dir = temp.path().join("env-build");

  cwasm_cmd()
    .args(["--output", "json", "info"])
    .env("CWASM_WASI_SDK", "/opt/env-sdk")
    .env("CWASM_BUILD_DIR", &build_dir)
    .env_remove("CWASM_INCLUDE_DIR")
    .assert()
    .success()
    .stdout(predicate::str::contains("/opt/env-sdk/bin/clang"))
    .stdout(predicate::str::contains(build_dir.to_str().unwrap()));
}

#[cfg(unix)]
#[test]
#[serial]
fn build_dir_flag_wins_over_config_and_environment() {
  let env = TestEnv::new();
  let source = env.write_source("hello.c", "int main(void) { return 0; }\n");
  let flag_dir = env.temp.path().join("flag-build");
  std::fs::create_dir_all(&flag_dir).unwrap();

  env
    .cmd()
    .arg("--build-dir")
    .arg(&flag_dir)
    .arg("build")
    .arg(&source)
    .env("CWASM_BUILD_DIR", env.temp.path().join("absent"))
    .assert()
    .success();

  assert_eq!(entries(&flag_dir), 0);
  assert!(source.with_extension("wasm").exists());
}

#[test]
fn invalid_config_fails() {
  let temp = TempDir::new().unwrap();
  let config = temp.path().join("cwasm.json");
  std::fs::write(&config, "not json").unwrap();

  cwasm_cmd()
    .arg("--config")
    .arg(&config)
    .arg("info")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load config"));
}
