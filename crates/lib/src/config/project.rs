//! Project file (`cforge.toml`) and the resolved on-disk layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ConfigError;
use crate::config::flags::ArtifactKind;
use crate::consts::{BIN_DIR, DEP_DIR, DEP_RECORD_EXT, MOD_DIR, OBJ_DIR, PROJECT_FILE};
use crate::platform::PlatformTag;

/// How a module directory refers back to the shared library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
  #[default]
  Symlink,
  Copy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibrarySection {
  pub dir: PathBuf,
}

impl Default for LibrarySection {
  fn default() -> Self {
    Self { dir: PathBuf::from("vl") }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutablesSection {
  pub dir: PathBuf,
  /// Header shared by every executable's driver.
  pub driver_header: Option<PathBuf>,
}

impl Default for ExecutablesSection {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("src"),
      driver_header: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModulesSection {
  pub dir: PathBuf,
  pub link: LinkMode,
}

impl Default for ModulesSection {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("toolbox"),
      link: LinkMode::default(),
    }
  }
}

/// Contents of `cforge.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectFile {
  pub name: String,
  pub output: PathBuf,
  pub include: Vec<PathBuf>,
  pub cflags: Vec<String>,
  pub library: LibrarySection,
  pub executables: ExecutablesSection,
  pub modules: ModulesSection,
}

impl Default for ProjectFile {
  fn default() -> Self {
    Self {
      name: "vl".to_string(),
      output: PathBuf::from("build"),
      include: vec![PathBuf::from(".")],
      cflags: Vec::new(),
      library: LibrarySection::default(),
      executables: ExecutablesSection::default(),
      modules: ModulesSection::default(),
    }
  }
}

impl ProjectFile {
  /// Load `cforge.toml` from `project_root`, or the defaults if it is absent.
  pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
    let path = project_root.join(PROJECT_FILE);
    if !path.exists() {
      debug!(path = %path.display(), "no project file, using defaults");
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    let project: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
      path: path.clone(),
      message: e.to_string(),
    })?;

    if project.name.trim().is_empty() {
      return Err(ConfigError::Invalid("library name must not be empty".to_string()));
    }
    Ok(project)
  }
}

/// Absolute paths for every input tree and output location of one platform.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
  pub project_root: PathBuf,
  pub name: String,
  pub output_root: PathBuf,
  pub platform_root: PathBuf,
  pub library_dir: PathBuf,
  pub executables_dir: PathBuf,
  pub modules_dir: PathBuf,
  pub driver_header: Option<PathBuf>,
  pub include_dirs: Vec<PathBuf>,
  pub link_mode: LinkMode,
  lib_suffix: &'static str,
  module_suffix: &'static str,
}

impl Layout {
  pub fn new(project_root: &Path, project: &ProjectFile, tag: PlatformTag) -> Self {
    let abs = |p: &Path| project_root.join(p);
    let output_root = abs(&project.output);
    Self {
      project_root: project_root.to_path_buf(),
      name: project.name.clone(),
      platform_root: output_root.join(tag.as_str()),
      output_root,
      library_dir: abs(&project.library.dir),
      executables_dir: abs(&project.executables.dir),
      modules_dir: abs(&project.modules.dir),
      driver_header: project.executables.driver_header.as_deref().map(abs),
      include_dirs: project.include.iter().map(|p| abs(p)).collect(),
      link_mode: project.modules.link,
      lib_suffix: tag.lib_suffix(),
      module_suffix: tag.module_suffix(),
    }
  }

  pub fn obj_dir(&self) -> PathBuf {
    self.platform_root.join(OBJ_DIR)
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.platform_root.join(BIN_DIR)
  }

  pub fn mod_dir(&self) -> PathBuf {
    self.platform_root.join(MOD_DIR)
  }

  pub fn dep_dir(&self, kind: ArtifactKind) -> PathBuf {
    self.platform_root.join(DEP_DIR).join(kind.as_str())
  }

  /// `lib<name>.<suffix>`
  pub fn library_file_name(&self) -> String {
    format!("lib{}.{}", self.name, self.lib_suffix)
  }

  pub fn library_path(&self) -> PathBuf {
    self.bin_dir().join(self.library_file_name())
  }

  /// Directory a source lives in for the given artifact kind.
  pub fn source_root(&self, kind: ArtifactKind) -> &Path {
    match kind {
      ArtifactKind::Library => &self.library_dir,
      ArtifactKind::Executable => &self.executables_dir,
      ArtifactKind::Module => &self.modules_dir,
    }
  }

  /// Path of `source` relative to its kind's source root.
  fn relative<'a>(&self, kind: ArtifactKind, source: &'a Path) -> &'a Path {
    source.strip_prefix(self.source_root(kind)).unwrap_or(source)
  }

  pub fn object_path(&self, source: &Path) -> PathBuf {
    self
      .obj_dir()
      .join(self.relative(ArtifactKind::Library, source))
      .with_extension("o")
  }

  pub fn record_path(&self, kind: ArtifactKind, source: &Path) -> PathBuf {
    let rel = self.relative(kind, source);
    let mut name = rel.as_os_str().to_os_string();
    name.push(".");
    name.push(DEP_RECORD_EXT);
    self.dep_dir(kind).join(name)
  }

  pub fn executable_path(&self, source: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or(source.as_os_str());
    self.bin_dir().join(stem)
  }

  pub fn module_path(&self, source: &Path) -> PathBuf {
    self
      .mod_dir()
      .join(self.relative(ArtifactKind::Module, source))
      .with_extension(self.module_suffix)
  }

  /// Render `path` relative to the project root for progress lines.
  pub fn display_path(&self, path: &Path) -> String {
    path
      .strip_prefix(&self.project_root)
      .unwrap_or(path)
      .display()
      .to_string()
  }
}
