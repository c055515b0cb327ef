//! Build graph keyed by filesystem path.
//!
//! Nodes are targets (files); an edge runs from a prerequisite to the target
//! that needs it. Targets without a rule are leaves that must already exist.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::config::ArtifactKind;

use super::types::BuildError;

/// What a target path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  Source,
  Header,
  DirMarker,
  DepRecord,
  Object,
  Library,
  Executable,
  Module,
  LibraryLink,
}

/// How a target is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
  /// Create a directory and its marker.
  Materialize { dir: PathBuf },
  /// Discover the headers of `source` and write its dependency record.
  Scan {
    kind: ArtifactKind,
    source: PathBuf,
    /// The artifact the record describes.
    artifact: PathBuf,
  },
  /// Compile one library source to an object.
  Compile { source: PathBuf },
  /// Link all library objects into the shared library.
  LinkLibrary { objects: Vec<PathBuf> },
  /// Compile and link one driver program.
  LinkExecutable { source: PathBuf },
  /// Compile and link one extension module.
  BuildModule { source: PathBuf },
  /// Make the shared library reachable from a module directory.
  PlaceLibrary { dir: PathBuf },
}

/// A node of the build graph.
#[derive(Debug, Clone)]
pub struct Target {
  pub path: PathBuf,
  pub kind: TargetKind,
  pub rule: Option<Rule>,
  /// Leaf whose absence means "changed" rather than an error.
  pub optional: bool,
  /// Rebuild regardless of timestamps.
  pub always: bool,
  /// Leaf that is known not to be built in this invocation.
  pub poisoned: bool,
  /// Leaf rewritten earlier in this invocation; dependents treat it as newer.
  pub changed: bool,
}

impl Target {
  pub fn leaf(path: impl Into<PathBuf>, kind: TargetKind) -> Self {
    Self {
      path: path.into(),
      kind,
      rule: None,
      optional: false,
      always: false,
      poisoned: false,
      changed: false,
    }
  }

  pub fn with_rule(path: impl Into<PathBuf>, kind: TargetKind, rule: Rule) -> Self {
    Self {
      rule: Some(rule),
      ..Self::leaf(path, kind)
    }
  }

  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn poisoned(mut self) -> Self {
    self.poisoned = true;
    self
  }

  pub fn changed(mut self) -> Self {
    self.changed = true;
    self
  }
}

/// A directed acyclic graph of file targets.
#[derive(Debug, Default)]
pub struct BuildGraph {
  graph: DiGraph<Target, ()>,
  nodes: HashMap<PathBuf, NodeIndex>,
}

impl BuildGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert `target`, or merge it into the existing node for the same path.
  ///
  /// A rule may be attached to a node that was first seen as a leaf. Adding
  /// the same rule again is a no-op; two different rules for one path are
  /// rejected. Leaf flags only ever tighten: a path that is required anywhere
  /// stops being optional.
  pub fn add(&mut self, target: Target) -> Result<NodeIndex, BuildError> {
    let Some(&idx) = self.nodes.get(&target.path) else {
      let path = target.path.clone();
      let idx = self.graph.add_node(target);
      self.nodes.insert(path, idx);
      return Ok(idx);
    };

    let existing = &mut self.graph[idx];
    match (&existing.rule, target.rule) {
      (Some(current), Some(rule)) if *current == rule => {}
      (Some(_), Some(_)) => return Err(BuildError::ConflictingRules { path: target.path }),
      (None, Some(rule)) => {
        existing.rule = Some(rule);
        existing.kind = target.kind;
        existing.optional = false;
      }
      (_, None) => {}
    }
    existing.optional &= target.optional;
    existing.always |= target.always;
    existing.poisoned |= target.poisoned;
    existing.changed |= target.changed;
    Ok(idx)
  }

  /// Record that `target` needs `prerequisite`. Duplicate edges are collapsed.
  pub fn add_edge(&mut self, prerequisite: NodeIndex, target: NodeIndex) {
    self.graph.update_edge(prerequisite, target, ());
  }

  /// Add `prerequisite` (if new) and an edge from it to `target`.
  pub fn require(&mut self, target: NodeIndex, prerequisite: Target) -> Result<NodeIndex, BuildError> {
    let idx = self.add(prerequisite)?;
    self.add_edge(idx, target);
    Ok(idx)
  }

  pub fn index_of(&self, path: &Path) -> Option<NodeIndex> {
    self.nodes.get(path).copied()
  }

  pub fn target(&self, idx: NodeIndex) -> &Target {
    &self.graph[idx]
  }

  pub fn targets(&self) -> impl Iterator<Item = &Target> {
    self.graph.node_weights()
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Direct prerequisites of a node.
  pub fn prerequisites(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(idx, Direction::Incoming).collect()
  }

  /// Direct dependents of a node.
  pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(idx, Direction::Outgoing).collect()
  }

  /// Verify that the graph is acyclic.
  pub fn verify_acyclic(&self) -> Result<(), BuildError> {
    toposort(&self.graph, None).map_err(|cycle| BuildError::CycleDetected {
      path: self.graph[cycle.node_id()].path.clone(),
    })?;
    Ok(())
  }

  /// Group nodes into waves: every prerequisite of a node sits in an earlier
  /// wave. Nodes within a wave are ordered by path.
  pub fn execution_waves(&self) -> Result<Vec<Vec<NodeIndex>>, BuildError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();

      if ready.is_empty() {
        let stuck = remaining.iter().map(|idx| &self.graph[*idx].path).min().cloned();
        return Err(BuildError::CycleDetected {
          path: stuck.unwrap_or_default(),
        });
      }

      ready.sort_by(|a, b| self.graph[*a].path.cmp(&self.graph[*b].path));
      for &idx in &ready {
        remaining.remove(&idx);
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&dependent) {
            *deg = deg.saturating_sub(1);
          }
        }
      }
      waves.push(ready);
    }

    Ok(waves)
  }
}
