//! Library links inside module directories.
//!
//! Every directory that receives a module also gets a link to the shared
//! library so the module loader finds it beside the module.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{Layout, LinkMode};
use crate::staleness::{is_stale, mtime};
use crate::util::path::relative_to;

/// Make sure `module_dir` holds a link (or copy) of the library.
///
/// Returns `true` if this call created or refreshed it. Concurrent callers for
/// the same directory are safe: losing the race is not an error.
pub fn ensure_library_link(layout: &Layout, module_dir: &Path) -> io::Result<bool> {
  let library = layout.library_path();
  let dest = module_dir.join(layout.library_file_name());

  match layout.link_mode {
    LinkMode::Symlink if cfg!(unix) => {
      if dest.symlink_metadata().is_ok() {
        return Ok(false);
      }
      let rel = relative_to(module_dir, &library);
      match symlink(&rel, &dest) {
        Ok(()) => {
          debug!(link = %dest.display(), target = %rel.display(), "linked library");
          Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
      }
    }
    _ => {
      if !is_stale(mtime(&dest)?, &[mtime(&library)?]) {
        return Ok(false);
      }
      let mut tmp = NamedTempFile::new_in(module_dir)?;
      let mut src = std::fs::File::open(&library)?;
      io::copy(&mut src, tmp.as_file_mut())?;
      tmp.persist(&dest).map_err(|e| e.error)?;
      debug!(copy = %dest.display(), "copied library");
      Ok(true)
    }
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
  Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks are unix-only"))
}
