//! Lexical path helpers.
//!
//! Nothing here touches the filesystem; paths are compared component by
//! component so the graph keys stay stable whether or not files exist yet.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Remove `.` components and fold `..` into the preceding component.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Path that leads from directory `from` to `to`, e.g. `../../bin/libvl.so`.
///
/// Both paths are expected to be absolute (or both relative to the same base).
pub fn relative_to(from: &Path, to: &Path) -> PathBuf {
  let from = normalize(from);
  let to = normalize(to);
  let from: Vec<_> = from.components().collect();
  let to: Vec<_> = to.components().collect();

  let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

  let mut rel = PathBuf::new();
  for _ in common..from.len() {
    rel.push("..");
  }
  for component in &to[common..] {
    rel.push(component.as_os_str());
  }
  rel
}

/// Sibling path an output is written to before being renamed into place.
pub fn partial_path(output: &Path) -> PathBuf {
  let mut name = OsString::from(".");
  name.push(output.file_name().unwrap_or(output.as_os_str()));
  name.push(".partial");
  output.with_file_name(name)
}
