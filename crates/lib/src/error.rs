//! Phase-tagged build errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The stage of the build protocol a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  /// Writing the source to its transient file.
  Stage,
  /// Running the external compiler.
  Compile,
  /// Checking the artifact exists and is a WebAssembly module.
  Verify,
  /// Loading the artifact into memory.
  Read,
  /// Deleting the transient files.
  Clean,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Stage => "stage",
      Phase::Compile => "compile",
      Phase::Verify => "verify",
      Phase::Read => "read",
      Phase::Clean => "clean",
    }
  }
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors that can occur while compiling C source to WebAssembly.
///
/// Every variant names the file(s) involved so the failure can be acted on
/// without re-running the build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The derived source path already existed.
  #[error("[{}] {path} already exists", Phase::Stage)]
  StagingCollision { path: PathBuf },

  /// Filesystem or process I/O failed.
  #[error("[{phase}] io error on {path}: {source}")]
  Io {
    phase: Phase,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The compiler exited non-zero.
  #[error("[{}] compiling {src} to {dst} failed with exit code {code:?}:\n{diagnostics}", Phase::Compile)]
  CompileFailed {
    src: PathBuf,
    dst: PathBuf,
    code: Option<i32>,
    diagnostics: String,
  },

  /// The compiler exited zero but wrote to standard output.
  #[error("[{}] compiling {src} to {dst} produced unexpected output:\n{output}", Phase::Compile)]
  UnexpectedOutput { src: PathBuf, dst: PathBuf, output: String },

  /// The compiler reported success but the artifact cannot be found.
  #[error("[{}] compiled file {path} is missing: {source}", Phase::Verify)]
  ArtifactMissing {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The artifact is not a WebAssembly module.
  #[error("[{}] compiled file {path} is not a wasm file", Phase::Verify)]
  FormatInvalid { path: PathBuf },

  /// One or both transient files could not be deleted after the artifact was read.
  #[error("[{}] failed to delete {}", Phase::Clean, join_failures(.failures))]
  CleanupFailed { failures: Vec<CleanupFailure> },
}

/// A transient file that could not be deleted.
#[derive(Debug)]
pub struct CleanupFailure {
  pub path: PathBuf,
  pub source: io::Error,
}

impl std::fmt::Display for CleanupFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.path.display(), self.source)
  }
}

fn join_failures(failures: &[CleanupFailure]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl BuildError {
  pub fn phase(&self) -> Phase {
    match self {
      BuildError::StagingCollision { .. } => Phase::Stage,
      BuildError::Io { phase, .. } => *phase,
      BuildError::CompileFailed { .. } | BuildError::UnexpectedOutput { .. } => Phase::Compile,
      BuildError::ArtifactMissing { .. } | BuildError::FormatInvalid { .. } => Phase::Verify,
      BuildError::CleanupFailed { .. } => Phase::Clean,
    }
  }

  /// True when the submitted source is at fault rather than the infrastructure.
  ///
  /// Only these errors are meaningful to whoever submitted the code; all
  /// others are operator-facing.
  pub fn is_input_error(&self) -> bool {
    matches!(
      self,
      BuildError::CompileFailed { .. } | BuildError::UnexpectedOutput { .. }
    )
  }

  /// Captured compiler output, if this error carries any.
  pub fn diagnostics(&self) -> Option<&str> {
    match self {
      BuildError::CompileFailed { diagnostics, .. } => Some(diagnostics),
      BuildError::UnexpectedOutput { output, .. } => Some(output),
      _ => None,
    }
  }

  pub(crate) fn io(phase: Phase, path: impl Into<PathBuf>, source: io::Error) -> Self {
    BuildError::Io {
      phase,
      path: path.into(),
      source,
    }
  }
}
