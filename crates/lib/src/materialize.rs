//! Output directory materialization.
//!
//! A directory counts as materialized once its `.dirstamp` marker exists.
//! Creating the same directory from many tasks at once is fine: an existing
//! directory or marker is success, never an error.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::DIR_MARKER;

/// Path of the marker for `dir`.
pub fn marker_path(dir: &Path) -> PathBuf {
  dir.join(DIR_MARKER)
}

/// Ensure `dir` and all of its parents exist, and that its marker exists.
///
/// Returns `true` only for the call that created the marker.
pub fn ensure_dir(dir: &Path) -> io::Result<bool> {
  let marker = marker_path(dir);
  if marker.exists() {
    return Ok(false);
  }

  std::fs::create_dir_all(dir)?;

  match OpenOptions::new().write(true).create_new(true).open(&marker) {
    Ok(_) => {
      debug!(dir = %dir.display(), "materialized directory");
      Ok(true)
    }
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
    Err(e) => Err(e),
  }
}
