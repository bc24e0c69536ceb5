//! Collection of transient files left behind by failed builds.
//!
//! A failed build keeps its staged source (and possibly its artifact) so the
//! failure can be inspected. This sweep removes such residue once it is old
//! enough that no running build can still own it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use std::{fs, io};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compile::{ARTIFACT_EXT, SOURCE_EXT};
use crate::id::is_generated_id;

#[derive(Debug, Error)]
pub enum SweepError {
  #[error("failed to read build directory {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Default, serde::Serialize)]
pub struct SweepStats {
  pub scanned: usize,
  pub deleted: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct SweepResult {
  pub stats: SweepStats,
  pub deleted_paths: Vec<PathBuf>,
}

/// Whether `path` is named like a file this crate stages (`<id>.c` or `<id>.wasm`).
pub fn is_transient_file(path: &Path) -> bool {
  let ext_ok = matches!(
    path.extension().and_then(|e| e.to_str()),
    Some(ext) if ext == SOURCE_EXT || ext == ARTIFACT_EXT
  );
  ext_ok && path.file_stem().and_then(|s| s.to_str()).is_some_and(is_generated_id)
}

/// Remove transient files in `build_dir` last modified more than `older_than` ago.
///
/// Files not named like build residue are never touched. Individual delete
/// failures are logged and skipped.
pub fn sweep_residue(build_dir: &Path, older_than: Duration, dry_run: bool) -> Result<SweepResult, SweepError> {
  let entries = fs::read_dir(build_dir).map_err(|source| SweepError::ReadDir {
    path: build_dir.to_path_buf(),
    source,
  })?;

  let now = SystemTime::now();
  let mut stats = SweepStats::default();
  let mut deleted_paths = Vec::new();

  for entry in entries.flatten() {
    let path = entry.path();
    let metadata = match entry.metadata() {
      Ok(m) if m.is_file() => m,
      _ => continue,
    };
    if !is_transient_file(&path) {
      continue;
    }

    stats.scanned += 1;

    let age = metadata
      .modified()
      .ok()
      .and_then(|mtime| now.duration_since(mtime).ok())
      .unwrap_or_default();
    if age < older_than {
      debug!(path = %path.display(), age = ?age, "keeping recent build file");
      continue;
    }

    if !dry_run && let Err(e) = fs::remove_file(&path) {
      warn!(path = %path.display(), error = %e, "failed to delete build residue");
      continue;
    }

    debug!(path = %path.display(), dry_run, "removed build residue");
    stats.deleted += 1;
    stats.bytes_freed += metadata.len();
    deleted_paths.push(path);
  }

  info!(
    scanned = stats.scanned,
    deleted = stats.deleted,
    bytes_freed = stats.bytes_freed,
    dry_run,
    "residue sweep complete"
  );

  Ok(SweepResult { stats, deleted_paths })
}
