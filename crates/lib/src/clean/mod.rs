//! Removal of build outputs.
//!
//! `clean` removes what one platform's builds produced: objects, dependency
//! records, the library, executables, modules and the library links beside
//! them. Directories and their markers under `bin/` and `mod/` are kept.
//! `distclean` removes the whole output root, every platform included.
//! Sources are never touched: nothing outside the output root is visited, and
//! an output root that is, or contains, the project root or a source directory
//! is refused.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::consts::{BIN_DIR, DEP_DIR, DIR_MARKER, MOD_DIR, OBJ_DIR};
use crate::util::path::normalize;

#[derive(Debug, Error)]
pub enum CleanError {
  #[error("failed to read {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("refusing to remove {path}: it is not below the project root")]
  OutsideProject { path: PathBuf },

  #[error("refusing to remove {path}: it contains the sources in {sources}")]
  ContainsSources { path: PathBuf, sources: PathBuf },
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanStats {
  pub files_removed: usize,
  pub dirs_removed: usize,
  pub bytes_freed: u64,
  /// Paths that could not be removed.
  pub failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanResult {
  pub stats: CleanStats,
  pub removed: Vec<PathBuf>,
  pub dry_run: bool,
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

struct Sweeper {
  dry_run: bool,
  stats: CleanStats,
  removed: Vec<PathBuf>,
}

impl Sweeper {
  fn new(dry_run: bool) -> Self {
    Self {
      dry_run,
      stats: CleanStats::default(),
      removed: Vec::new(),
    }
  }

  fn remove_tree(&mut self, path: &Path) {
    if path.symlink_metadata().is_err() {
      return;
    }
    let size = dir_size(path);
    debug!(path = %path.display(), "removing directory");

    if !self.dry_run
      && let Err(e) = fs::remove_dir_all(path)
    {
      warn!(path = %path.display(), error = %e, "failed to delete directory");
      self.stats.failures += 1;
      return;
    }
    self.stats.dirs_removed += 1;
    self.stats.bytes_freed += size;
    self.removed.push(path.to_path_buf());
  }

  /// Remove every file and symlink below `dir` except directory markers.
  fn remove_files(&mut self, dir: &Path) -> Result<(), CleanError> {
    if !dir.is_dir() {
      return Ok(());
    }
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
      let entry = entry.map_err(|e| CleanError::Walk {
        path: e.path().unwrap_or(dir).to_path_buf(),
        source: e.into(),
      })?;
      if entry.file_type().is_dir() || entry.file_name() == DIR_MARKER {
        continue;
      }
      // Symlinks are not followed, so a library link never costs its target's size.
      let size = if entry.file_type().is_file() {
        entry.metadata().map(|m| m.len()).unwrap_or(0)
      } else {
        0
      };
      let path = entry.into_path();

      if !self.dry_run
        && let Err(e) = fs::remove_file(&path)
      {
        warn!(path = %path.display(), error = %e, "failed to delete file");
        self.stats.failures += 1;
        continue;
      }
      self.stats.files_removed += 1;
      self.stats.bytes_freed += size;
      self.removed.push(path);
    }
    Ok(())
  }

  fn finish(self) -> CleanResult {
    CleanResult {
      stats: self.stats,
      removed: self.removed,
      dry_run: self.dry_run,
    }
  }
}

/// `path` with `.` and `..` folded, provided removing it cannot reach the
/// project root or any source directory.
fn removable(config: &BuildConfig, path: &Path) -> Result<PathBuf, CleanError> {
  let layout = &config.layout;
  let root = normalize(&layout.project_root);
  let path = normalize(path);
  if !path.starts_with(&root) || root.starts_with(&path) {
    return Err(CleanError::OutsideProject { path });
  }

  let protected = [&layout.library_dir, &layout.executables_dir, &layout.modules_dir]
    .into_iter()
    .chain(&layout.include_dirs)
    .map(|dir| normalize(dir));
  for sources in protected {
    if sources.starts_with(&path) {
      return Err(CleanError::ContainsSources { path, sources });
    }
  }
  Ok(path)
}

/// Remove the outputs of the configured platform.
pub fn clean(config: &BuildConfig, dry_run: bool) -> Result<CleanResult, CleanError> {
  let platform_root = removable(config, &config.layout.platform_root)?;

  let mut sweeper = Sweeper::new(dry_run);
  sweeper.remove_tree(&platform_root.join(OBJ_DIR));
  sweeper.remove_tree(&platform_root.join(DEP_DIR));
  sweeper.remove_files(&platform_root.join(BIN_DIR))?;
  sweeper.remove_files(&platform_root.join(MOD_DIR))?;

  let result = sweeper.finish();
  info!(
    platform = %config.platform,
    files = result.stats.files_removed,
    dirs = result.stats.dirs_removed,
    bytes_freed = result.stats.bytes_freed,
    dry_run,
    "clean complete"
  );
  Ok(result)
}

/// Remove the whole output root.
pub fn distclean(config: &BuildConfig, dry_run: bool) -> Result<CleanResult, CleanError> {
  let output_root = removable(config, &config.layout.output_root)?;

  let mut sweeper = Sweeper::new(dry_run);
  sweeper.remove_tree(&output_root);

  let result = sweeper.finish();
  info!(
    output = %output_root.display(),
    bytes_freed = result.stats.bytes_freed,
    dry_run,
    "distclean complete"
  );
  Ok(result)
}
