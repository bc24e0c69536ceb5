//! C to WebAssembly build pipeline.
//!
//! Each call to [`WasiCompiler::build_c`] runs one strictly ordered pass:
//!
//! 1. derive `<id>.c` / `<id>.wasm` paths from a fresh build identifier
//! 2. stage the source into a file that must not already exist
//! 3. run the compiler and check its exit status and standard output
//! 4. check the artifact exists
//! 5. check the artifact is a WebAssembly module
//! 6. read the artifact
//! 7. delete the source, then the artifact
//!
//! Any failure ends the build. Nothing is cleaned up after a failure before
//! step 7; leftover files can be collected with [`crate::sweep`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::classify::{ArtifactClassifier, WasmMagicClassifier};
use crate::config::CompilerConfig;
use crate::error::{BuildError, CleanupFailure, Phase};
use crate::id::{IdGenerator, UuidGenerator};

/// Extension of staged source files.
pub const SOURCE_EXT: &str = "c";

/// Extension of compiled artifacts.
pub const ARTIFACT_EXT: &str = "wasm";

/// Transient paths owned by a single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
  pub src: PathBuf,
  pub dst: PathBuf,
}

impl BuildPaths {
  pub fn new(build_dir: &Path, id: &str) -> Self {
    BuildPaths {
      src: build_dir.join(format!("{}.{}", id, SOURCE_EXT)),
      dst: build_dir.join(format!("{}.{}", id, ARTIFACT_EXT)),
    }
  }
}

/// Compiles C source to WASI modules with an external clang.
///
/// Cheap to clone; clones share the configuration and collaborators, and
/// concurrent builds are independent of each other.
#[derive(Clone)]
pub struct WasiCompiler {
  config: Arc<CompilerConfig>,
  ids: Arc<dyn IdGenerator>,
  classifier: Arc<dyn ArtifactClassifier>,
}

impl std::fmt::Debug for WasiCompiler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WasiCompiler").field("config", &self.config).finish_non_exhaustive()
  }
}

impl WasiCompiler {
  pub fn new(config: CompilerConfig) -> Self {
    Self::with_collaborators(config, Arc::new(UuidGenerator), Arc::new(WasmMagicClassifier))
  }

  pub fn with_collaborators(
    config: CompilerConfig,
    ids: Arc<dyn IdGenerator>,
    classifier: Arc<dyn ArtifactClassifier>,
  ) -> Self {
    WasiCompiler {
      config: Arc::new(config),
      ids,
      classifier,
    }
  }

  pub fn config(&self) -> &CompilerConfig {
    &self.config
  }

  /// Compile `source` and return the bytes of the produced WebAssembly module.
  ///
  /// The calling task is suspended until the compiler exits; there is no
  /// timeout here. On success neither transient file is left on disk.
  pub async fn build_c(&self, source: &str) -> Result<Vec<u8>, BuildError> {
    let id = self.ids.next_id();
    let paths = BuildPaths::new(&self.config.build_dir, &id);
    debug!(id = %id, src = %paths.src.display(), "starting build");

    stage_source(&paths.src, source).await?;
    debug!(src = %paths.src.display(), "source staged");

    self.run_compiler(&paths).await?;
    debug!(dst = %paths.dst.display(), "compiled");

    fs::metadata(&paths.dst)
      .await
      .map_err(|source| BuildError::ArtifactMissing {
        path: paths.dst.clone(),
        source,
      })?;
    if !self.classify(&paths.dst).await? {
      return Err(BuildError::FormatInvalid { path: paths.dst });
    }
    debug!(dst = %paths.dst.display(), "artifact verified");

    let bytes = fs::read(&paths.dst)
      .await
      .map_err(|e| BuildError::io(Phase::Read, &paths.dst, e))?;
    debug!(dst = %paths.dst.display(), size = bytes.len(), "artifact read");

    remove_transient(&paths).await?;

    info!(id = %id, size = bytes.len(), "wasm build complete");
    Ok(bytes)
  }

  /// Run the classifier off the async workers; it reads the file synchronously.
  async fn classify(&self, path: &Path) -> Result<bool, BuildError> {
    let classifier = Arc::clone(&self.classifier);
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || classifier.is_wasm(&owned))
      .await
      .map_err(|e| BuildError::io(Phase::Verify, path, io::Error::other(e)))
  }

  async fn run_compiler(&self, paths: &BuildPaths) -> Result<(), BuildError> {
    let args = self.config.compiler_args(&paths.src, &paths.dst);
    debug!(compiler = %self.config.compiler.display(), args = ?args, "spawning compiler");

    // output() drains both pipes and reaps the child before returning, on error paths too.
    let output = Command::new(&self.config.compiler)
      .args(&args)
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| BuildError::io(Phase::Compile, &self.config.compiler, e))?;

    if !output.status.success() {
      let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
      debug!(code = ?output.status.code(), stderr = %diagnostics, "compiler failed");
      return Err(BuildError::CompileFailed {
        src: paths.src.clone(),
        dst: paths.dst.clone(),
        code: output.status.code(),
        diagnostics,
      });
    }

    // A clean run is silent on stdout. Benign chatter is still rejected.
    if !output.stdout.is_empty() {
      return Err(BuildError::UnexpectedOutput {
        src: paths.src.clone(),
        dst: paths.dst.clone(),
        output: String::from_utf8_lossy(&output.stdout).into_owned(),
      });
    }

    if !output.stderr.is_empty() {
      debug!(stderr = %String::from_utf8_lossy(&output.stderr), "compiler warnings");
    }

    Ok(())
  }
}

/// Write `source` to `src`, refusing to touch a file that is already there.
async fn stage_source(src: &Path, source: &str) -> Result<(), BuildError> {
  match fs::symlink_metadata(src).await {
    Ok(_) => return Err(BuildError::StagingCollision { path: src.to_path_buf() }),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(BuildError::io(Phase::Stage, src, e)),
  }

  match write_new_file(src, source.as_bytes()).await {
    Ok(()) => Ok(()),
    // Lost a race with another writer between the check and the open.
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(BuildError::StagingCollision { path: src.to_path_buf() }),
    Err(e) => Err(BuildError::io(Phase::Stage, src, e)),
  }
}

async fn write_new_file(path: &Path, content: &[u8]) -> io::Result<()> {
  use tokio::io::AsyncWriteExt;

  let mut options = fs::OpenOptions::new();
  options.write(true).create_new(true);
  #[cfg(unix)]
  options.mode(0o644);

  let mut file = options.open(path).await?;
  file.write_all(content).await?;
  file.flush().await
}

/// Delete both transient files, each independently of the other.
///
/// Every failed deletion is reported, so a failure on the source never hides
/// one on the artifact.
async fn remove_transient(paths: &BuildPaths) -> Result<(), BuildError> {
  let mut failures = Vec::new();
  for path in [&paths.src, &paths.dst] {
    if let Err(source) = fs::remove_file(path).await {
      warn!(path = %path.display(), error = %source, "failed to delete build file");
      failures.push(CleanupFailure {
        path: path.clone(),
        source,
      });
    }
  }

  if failures.is_empty() {
    Ok(())
  } else {
    Err(BuildError::CleanupFailed { failures })
  }
}
