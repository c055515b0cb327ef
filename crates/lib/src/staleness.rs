//! Timestamp-based staleness.
//!
//! The comparison is a pure function of modification times so it can be
//! exercised without touching the filesystem.

use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Returns true if the target must be rebuilt.
///
/// `target` is the target's modification time, `None` if it does not exist.
/// Each prerequisite is `None` when it is missing or known to have changed,
/// which always makes the target stale.
pub fn is_stale(target: Option<SystemTime>, prerequisites: &[Option<SystemTime>]) -> bool {
  let Some(built_at) = target else {
    return true;
  };
  prerequisites.iter().any(|prereq| match prereq {
    Some(modified) => *modified > built_at,
    None => true,
  })
}

/// Modification time of `path`, `None` if it does not exist.
pub fn mtime(path: &Path) -> io::Result<Option<SystemTime>> {
  match std::fs::metadata(path) {
    Ok(meta) => meta.modified().map(Some),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e),
  }
}
