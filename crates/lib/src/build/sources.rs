//! Source discovery.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{ArtifactKind, Layout};
use crate::execute::types::BuildError;

/// C sources found in each input tree, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sources {
  pub library: Vec<PathBuf>,
  pub executables: Vec<PathBuf>,
  pub modules: Vec<PathBuf>,
}

impl Sources {
  pub fn get(&self, kind: ArtifactKind) -> &[PathBuf] {
    match kind {
      ArtifactKind::Library => &self.library,
      ArtifactKind::Executable => &self.executables,
      ArtifactKind::Module => &self.modules,
    }
  }
}

/// Find library and executable sources directly in their directories and
/// module sources anywhere below the module tree. Missing directories are
/// empty.
pub fn discover(layout: &Layout) -> Result<Sources, BuildError> {
  let sources = Sources {
    library: c_files(&layout.library_dir, false, &layout.output_root)?,
    executables: c_files(&layout.executables_dir, false, &layout.output_root)?,
    modules: c_files(&layout.modules_dir, true, &layout.output_root)?,
  };
  debug!(
    library = sources.library.len(),
    executables = sources.executables.len(),
    modules = sources.modules.len(),
    "discovered sources"
  );
  Ok(sources)
}

fn c_files(dir: &Path, recursive: bool, output_root: &Path) -> Result<Vec<PathBuf>, BuildError> {
  if !dir.is_dir() {
    debug!(dir = %dir.display(), "source directory does not exist");
    return Ok(Vec::new());
  }

  let walker = WalkDir::new(dir)
    .min_depth(1)
    .max_depth(if recursive { usize::MAX } else { 1 })
    .sort_by_file_name();

  let mut files = Vec::new();
  for entry in walker.into_iter().filter_entry(|e| !e.path().starts_with(output_root)) {
    let entry = entry.map_err(|e| {
      let path = e.path().unwrap_or(dir).to_path_buf();
      BuildError::io(path, e.into())
    })?;
    if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "c") {
      files.push(entry.into_path());
    }
  }
  files.sort();
  Ok(files)
}
