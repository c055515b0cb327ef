//! Graph planning for the two build phases.
//!
//! The scan graph brings every dependency record up to date. The build graph
//! is planned afterwards from the refreshed records, so header edges discovered
//! in this invocation already count.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;

use super::Goal;
use super::sources::Sources;
use crate::config::{ArtifactKind, BuildConfig, ConfigError, Layout, ScanPolicy};
use crate::deps::DepRecord;
use crate::execute::dag::{BuildGraph, Rule, Target, TargetKind};
use crate::execute::types::{BuildError, GraphResult};
use crate::materialize::marker_path;

/// The path a source's record describes.
pub fn artifact_path(layout: &Layout, kind: ArtifactKind, source: &Path) -> PathBuf {
  match kind {
    ArtifactKind::Library => layout.object_path(source),
    ArtifactKind::Executable => layout.executable_path(source),
    ArtifactKind::Module => layout.module_path(source),
  }
}

/// Add (or reuse) the marker target for `dir` and make `target` depend on it.
fn require_dir(graph: &mut BuildGraph, target: NodeIndex, dir: &Path) -> Result<NodeIndex, BuildError> {
  graph.require(
    target,
    Target::with_rule(
      marker_path(dir),
      TargetKind::DirMarker,
      Rule::Materialize { dir: dir.to_path_buf() },
    ),
  )
}

fn parent(path: &Path) -> &Path {
  path.parent().unwrap_or(Path::new("."))
}

/// Plan the record targets for every source the goal needs.
pub fn scan_graph(config: &BuildConfig, sources: &Sources, goal: Goal) -> Result<BuildGraph, BuildError> {
  let layout = &config.layout;
  let mut graph = BuildGraph::new();

  for &kind in goal.kinds() {
    let digest = config.flags.get(kind).digest();

    for source in sources.get(kind) {
      let record_path = layout.record_path(kind, source);
      let previous = DepRecord::load_lenient(&record_path).filter(|r| r.is_compatible(&digest));
      let always = config.scan_policy == ScanPolicy::Strict || (previous.is_none() && record_path.exists());

      let idx = graph.add(
        Target::with_rule(
          &record_path,
          TargetKind::DepRecord,
          Rule::Scan {
            kind,
            source: source.clone(),
            artifact: artifact_path(layout, kind, source),
          },
        )
        .always(always),
      )?;
      graph.require(idx, Target::leaf(source, TargetKind::Source))?;
      require_dir(&mut graph, idx, parent(&record_path))?;

      for header in previous.iter().flat_map(|r| &r.headers) {
        graph.require(idx, Target::leaf(header, TargetKind::Header).optional())?;
      }
    }
  }

  Ok(graph)
}

/// Records the scan phase touched, split by how it went.
struct Scanned<'a> {
  /// Failed, skipped or cancelled.
  missing: HashSet<&'a Path>,
  /// Rewritten with new content.
  rewritten: HashSet<&'a Path>,
}

impl<'a> Scanned<'a> {
  fn new(scan: &'a GraphResult) -> Self {
    let missing = scan
      .failed
      .iter()
      .map(|(p, _)| p.as_path())
      .chain(scan.skipped.keys().map(PathBuf::as_path))
      .chain(scan.cancelled.iter().map(PathBuf::as_path))
      .collect();
    let rewritten = scan.rebuilt.iter().map(PathBuf::as_path).collect();
    Self { missing, rewritten }
  }
}

/// Make `target` depend on the source's record and the headers it lists.
///
/// A record whose scan did not succeed in this invocation is poisoned so
/// that `target` is not attempted. A record rewritten in this invocation
/// counts as changed whatever its timestamp says.
fn require_record(
  graph: &mut BuildGraph,
  target: NodeIndex,
  record_path: &Path,
  scanned: &Scanned<'_>,
) -> Result<(), BuildError> {
  if scanned.missing.contains(record_path) {
    graph.require(target, Target::leaf(record_path, TargetKind::DepRecord).poisoned())?;
    return Ok(());
  }

  let leaf = Target::leaf(record_path, TargetKind::DepRecord);
  let leaf = if scanned.rewritten.contains(record_path) { leaf.changed() } else { leaf };
  graph.require(target, leaf)?;
  if let Some(record) = DepRecord::load_lenient(record_path) {
    for header in &record.headers {
      graph.require(target, Target::leaf(header, TargetKind::Header))?;
    }
  }
  Ok(())
}

/// Plan objects, the library, executables and modules for `goal`.
pub fn build_graph(
  config: &BuildConfig,
  sources: &Sources,
  goal: Goal,
  scan: &GraphResult,
) -> Result<BuildGraph, BuildError> {
  let layout = &config.layout;
  let mut graph = BuildGraph::new();

  let scanned = Scanned::new(scan);

  if sources.library.is_empty() {
    return Err(
      ConfigError::Invalid(format!(
        "no library sources found in {}",
        layout.library_dir.display()
      ))
      .into(),
    );
  }

  // Library.
  let mut objects = Vec::with_capacity(sources.library.len());
  let mut object_nodes = Vec::with_capacity(sources.library.len());
  for source in &sources.library {
    let object = layout.object_path(source);
    let idx = graph.add(Target::with_rule(
      &object,
      TargetKind::Object,
      Rule::Compile { source: source.clone() },
    ))?;
    graph.require(idx, Target::leaf(source, TargetKind::Source))?;
    require_dir(&mut graph, idx, parent(&object))?;
    require_record(
      &mut graph,
      idx,
      &layout.record_path(ArtifactKind::Library, source),
      &scanned,
    )?;
    objects.push(object);
    object_nodes.push(idx);
  }

  let library = graph.add(Target::with_rule(
    layout.library_path(),
    TargetKind::Library,
    Rule::LinkLibrary { objects },
  ))?;
  for idx in object_nodes {
    graph.add_edge(idx, library);
  }
  require_dir(&mut graph, library, &layout.bin_dir())?;

  // Executables.
  if goal.includes(ArtifactKind::Executable) {
    for source in &sources.executables {
      let exe = layout.executable_path(source);
      let idx = graph.add(Target::with_rule(
        &exe,
        TargetKind::Executable,
        Rule::LinkExecutable { source: source.clone() },
      ))?;
      graph.require(idx, Target::leaf(source, TargetKind::Source))?;
      if let Some(header) = &layout.driver_header {
        graph.require(idx, Target::leaf(header, TargetKind::Header))?;
      }
      graph.add_edge(library, idx);
      require_dir(&mut graph, idx, &layout.bin_dir())?;
      require_record(
        &mut graph,
        idx,
        &layout.record_path(ArtifactKind::Executable, source),
        &scanned,
      )?;
    }
  }

  // Modules.
  if goal.includes(ArtifactKind::Module) {
    for source in &sources.modules {
      let module = layout.module_path(source);
      let idx = graph.add(Target::with_rule(
        &module,
        TargetKind::Module,
        Rule::BuildModule { source: source.clone() },
      ))?;
      graph.require(idx, Target::leaf(source, TargetKind::Source))?;
      require_dir(&mut graph, idx, parent(&module))?;
      graph.add_edge(library, idx);
      require_record(
        &mut graph,
        idx,
        &layout.record_path(ArtifactKind::Module, source),
        &scanned,
      )?;

      // One library link per module directory, shared by its modules.
      let dir = parent(&module);
      let link = graph.add(Target::with_rule(
        dir.join(layout.library_file_name()),
        TargetKind::LibraryLink,
        Rule::PlaceLibrary { dir: dir.to_path_buf() },
      ))?;
      graph.add_edge(library, link);
      require_dir(&mut graph, link, dir)?;
    }
  }

  Ok(graph)
}
