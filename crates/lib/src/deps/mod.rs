//! Dependency records.
//!
//! One JSON record per source lists the headers the source includes, the
//! artifact it contributes to, and a digest of the compile flags the scan was
//! made with. Records are replaced atomically so a reader never observes a
//! half-written file.

pub mod scan;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::DEP_RECORD_VERSION;
use crate::staleness::{is_stale, mtime};

#[derive(Debug, Error)]
pub enum DepsError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write dependency record {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse dependency record {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("compiler could not scan {path}: {message}")]
  Compiler { path: PathBuf, message: String },
}

impl DepsError {
  /// The file the error is about.
  pub fn path(&self) -> &Path {
    match self {
      DepsError::Read { path, .. }
      | DepsError::Write { path, .. }
      | DepsError::Parse { path, .. }
      | DepsError::Compiler { path, .. } => path,
    }
  }
}

/// Persisted header dependencies of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepRecord {
  pub version: u32,
  pub source: PathBuf,
  /// The object or artifact compiled from `source`.
  pub target: PathBuf,
  /// Headers reachable from `source`, sorted, without `source` itself.
  pub headers: Vec<PathBuf>,
  pub flags_digest: String,
  pub scanned_at_unix: u64,
}

impl DepRecord {
  pub fn new(source: PathBuf, target: PathBuf, mut headers: Vec<PathBuf>, flags_digest: String) -> Self {
    headers.sort();
    headers.dedup();
    headers.retain(|h| h != &source);
    let scanned_at_unix = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or_default();
    Self {
      version: DEP_RECORD_VERSION,
      source,
      target,
      headers,
      flags_digest,
      scanned_at_unix,
    }
  }

  /// Load the record at `path`. A missing file is `Ok(None)`.
  pub fn load(path: &Path) -> Result<Option<Self>, DepsError> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(DepsError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    serde_json::from_str(&content)
      .map(Some)
      .map_err(|e| DepsError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
      })
  }

  /// Load a record, treating an unreadable or corrupt one as absent.
  pub fn load_lenient(path: &Path) -> Option<Self> {
    match Self::load(path) {
      Ok(record) => record,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring unusable dependency record");
        None
      }
    }
  }

  /// Write the record to `path` via a temporary file in the same directory.
  pub fn save(&self, path: &Path) -> Result<(), DepsError> {
    let write_err = |source| DepsError::Write {
      path: path.to_path_buf(),
      source,
    };
    let dir = path.parent().unwrap_or(Path::new("."));

    let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), headers = self.headers.len(), "saved dependency record");
    Ok(())
  }

  /// Write the record unless `path` already holds the same scan result.
  ///
  /// Returns `true` if the file was written. An identical record that is older
  /// than its source or one of its headers has its modification time bumped,
  /// so it is current again without its content changing.
  pub fn save_if_changed(&self, path: &Path) -> Result<bool, DepsError> {
    let Some(existing) = Self::load(path).ok().flatten() else {
      self.save(path)?;
      return Ok(true);
    };
    if !existing.same_scan(self) {
      self.save(path)?;
      return Ok(true);
    }

    let inputs: Vec<_> = std::iter::once(&self.source)
      .chain(&self.headers)
      .map(|p| mtime(p).ok().flatten())
      .collect();
    if is_stale(mtime(path).ok().flatten(), &inputs) {
      let touch_err = |source| DepsError::Write {
        path: path.to_path_buf(),
        source,
      };
      std::fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now()))
        .map_err(touch_err)?;
      debug!(path = %path.display(), "dependency record unchanged, touched");
    }
    Ok(false)
  }

  /// Equal apart from when the scan ran.
  pub fn same_scan(&self, other: &Self) -> bool {
    self.version == other.version
      && self.source == other.source
      && self.target == other.target
      && self.headers == other.headers
      && self.flags_digest == other.flags_digest
  }

  /// Whether this record was produced by the current format and flags.
  pub fn is_compatible(&self, flags_digest: &str) -> bool {
    self.version == DEP_RECORD_VERSION && self.flags_digest == flags_digest
  }
}
