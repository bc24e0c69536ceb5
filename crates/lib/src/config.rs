//! Build configuration for the WASI compiler.
//!
//! A [`CompilerConfig`] is created once at startup and then shared read-only
//! across every build. Nothing here is re-read per call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default location of the wasi-sdk installation.
pub const DEFAULT_WASI_SDK: &str = "/opt/wasi-sdk";

/// Default directory holding the support headers and helper source.
pub const DEFAULT_INCLUDE_DIR: &str = "/opt/wasi-sdk/include";

/// Helper source compiled alongside every user file.
pub const DEFAULT_HELPER_SOURCE: &str = "cJSON.c";

/// Environment variable overriding the wasi-sdk path.
pub const ENV_WASI_SDK: &str = "CWASM_WASI_SDK";

/// Environment variable overriding the support-includes directory.
pub const ENV_INCLUDE_DIR: &str = "CWASM_INCLUDE_DIR";

/// Environment variable overriding the transient build directory.
pub const ENV_BUILD_DIR: &str = "CWASM_BUILD_DIR";

/// Linker flag exporting every symbol from the produced module.
const EXPORT_ALL_FLAG: &str = "-Wl,--export-all";

const WARNING_FLAGS: &[&str] = &["-Wall", "-Wextra"];

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Immutable toolchain and staging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
  /// Path to the clang executable.
  pub compiler: PathBuf,
  /// Base flags (sysroot/target selection), passed first.
  pub cflags: Vec<String>,
  /// Support-includes directory, passed as `-I` and holding the helper source.
  pub include_dir: PathBuf,
  /// File name of the helper source inside `include_dir`.
  pub helper_source: String,
  /// Directory for staged sources and artifacts.
  pub build_dir: PathBuf,
}

/// On-disk config file. Every field is optional and falls back to the environment defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
  wasi_sdk: Option<PathBuf>,
  compiler: Option<PathBuf>,
  cflags: Option<Vec<String>>,
  include_dir: Option<PathBuf>,
  helper_source: Option<String>,
  build_dir: Option<PathBuf>,
}

impl CompilerConfig {
  /// Derive a configuration from a wasi-sdk installation root.
  ///
  /// The compiler is `<sdk>/bin/clang` and the sysroot is `<sdk>/share/wasi-sysroot`.
  pub fn from_sdk(sdk: impl AsRef<Path>, include_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
    let sdk = sdk.as_ref();
    let sysroot = sdk.join("share").join("wasi-sysroot");
    CompilerConfig {
      compiler: sdk.join("bin").join("clang"),
      cflags: vec![format!("--sysroot={}", sysroot.display())],
      include_dir: include_dir.into(),
      helper_source: DEFAULT_HELPER_SOURCE.to_string(),
      build_dir: build_dir.into(),
    }
  }

  /// Defaults, with `CWASM_WASI_SDK`, `CWASM_INCLUDE_DIR` and `CWASM_BUILD_DIR` applied on top.
  pub fn from_env() -> Self {
    let sdk = std::env::var(ENV_WASI_SDK)
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_WASI_SDK));
    let include_dir = std::env::var(ENV_INCLUDE_DIR)
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_INCLUDE_DIR));
    let build_dir = std::env::var(ENV_BUILD_DIR)
      .map(PathBuf::from)
      .unwrap_or_else(|_| std::env::temp_dir());
    Self::from_sdk(sdk, include_dir, build_dir)
  }

  /// Load a JSON config file layered over [`CompilerConfig::from_env`].
  ///
  /// `wasi_sdk` re-derives the compiler and sysroot flag; explicit `compiler`
  /// or `cflags` entries win over the derived values.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: ConfigFile = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(Self::from_env().merge(file))
  }

  fn merge(mut self, file: ConfigFile) -> Self {
    if let Some(sdk) = file.wasi_sdk {
      let derived = Self::from_sdk(&sdk, PathBuf::new(), PathBuf::new());
      self.compiler = derived.compiler;
      self.cflags = derived.cflags;
    }
    if let Some(compiler) = file.compiler {
      self.compiler = compiler;
    }
    if let Some(cflags) = file.cflags {
      self.cflags = cflags;
    }
    if let Some(include_dir) = file.include_dir {
      self.include_dir = include_dir;
    }
    if let Some(helper_source) = file.helper_source {
      self.helper_source = helper_source;
    }
    if let Some(build_dir) = file.build_dir {
      self.build_dir = build_dir;
    }
    self
  }

  /// Full path of the helper source compiled with every build.
  pub fn helper_path(&self) -> PathBuf {
    self.include_dir.join(&self.helper_source)
  }

  /// Compiler arguments for one build, in invocation order.
  pub fn compiler_args(&self, src: &Path, dst: &Path) -> Vec<String> {
    let mut args = self.cflags.clone();
    args.push(self.helper_path().display().to_string());
    args.push(format!("-I{}", self.include_dir.display()));
    args.push(src.display().to_string());
    args.push(EXPORT_ALL_FLAG.to_string());
    args.extend(WARNING_FLAGS.iter().map(|f| f.to_string()));
    args.push("-o".to_string());
    args.push(dst.display().to_string());
    args
  }
}

impl Default for CompilerConfig {
  fn default() -> Self {
    Self::from_sdk(DEFAULT_WASI_SDK, DEFAULT_INCLUDE_DIR, std::env::temp_dir())
  }
}
