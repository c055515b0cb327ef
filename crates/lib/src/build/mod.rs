//! Artifact builders.
//!
//! A build runs in two phases over the same executor:
//!
//! 1. the scan graph refreshes every dependency record the goal needs;
//! 2. the build graph, planned from those records, compiles and links.
//!
//! Under fail-fast, a failed scan phase ends the invocation before any
//! artifact is attempted.

pub mod link;
pub mod plan;
pub mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ArtifactKind, BuildConfig, ComposedFlags, FailurePolicy, Profile, ToolKind};
use crate::execute::actions::ActionContext;
use crate::execute::command::CommandRunner;
use crate::execute::dag::TargetKind;
use crate::execute::types::{BuildError, GraphResult};
use crate::execute::run_graph;
use crate::platform::PlatformTag;

pub use sources::{Sources, discover};

/// What a build command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Goal {
  All,
  Library,
  Executables,
  Modules,
}

impl Goal {
  /// Artifact kinds the goal needs; the library is always among them.
  pub fn kinds(&self) -> &'static [ArtifactKind] {
    match self {
      Goal::All => &ArtifactKind::ALL,
      Goal::Library => &[ArtifactKind::Library],
      Goal::Executables => &[ArtifactKind::Library, ArtifactKind::Executable],
      Goal::Modules => &[ArtifactKind::Library, ArtifactKind::Module],
    }
  }

  pub fn includes(&self, kind: ArtifactKind) -> bool {
    self.kinds().contains(&kind)
  }
}

/// Outcome of one build invocation.
#[derive(Debug)]
pub struct BuildReport {
  pub goal: Goal,
  pub scan: GraphResult,
  /// `None` when the scan phase stopped the invocation.
  pub build: Option<GraphResult>,
  /// External commands started across both phases.
  pub invocations: usize,
  pub elapsed: Duration,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.scan.is_success() && self.build.as_ref().is_some_and(GraphResult::is_success)
  }

  fn phases(&self) -> impl Iterator<Item = &GraphResult> {
    std::iter::once(&self.scan).chain(self.build.as_ref())
  }

  /// Every failure, scan phase first.
  pub fn failures(&self) -> impl Iterator<Item = &(PathBuf, BuildError)> {
    self.phases().flat_map(|p| p.failed.iter())
  }

  pub fn worst_failure(&self) -> Option<&BuildError> {
    self.failures().map(|(_, e)| e).max_by_key(|e| e.severity())
  }

  /// Artifacts and objects rebuilt in the build phase.
  pub fn rebuilt(&self) -> &[PathBuf] {
    self.build.as_ref().map(|b| b.rebuilt.as_slice()).unwrap_or_default()
  }

  pub fn summary(&self) -> BuildSummary {
    let failed = self
      .failures()
      .map(|(path, e)| FailureSummary {
        target: path.clone(),
        error: e.to_string(),
        severity: e.severity(),
      })
      .collect();
    let mut skipped: Vec<PathBuf> = self.phases().flat_map(|p| p.skipped.keys().cloned()).collect();
    skipped.sort();

    BuildSummary {
      goal: self.goal,
      success: self.is_success(),
      rebuilt: self.rebuilt().to_vec(),
      up_to_date: self.build.as_ref().map_or(0, |b| b.up_to_date.len()),
      rescanned: self.scan.rebuilt.len(),
      failed,
      skipped,
      cancelled: self.phases().flat_map(|p| p.cancelled.iter().cloned()).collect(),
      invocations: self.invocations,
      elapsed_ms: self.elapsed.as_millis(),
    }
  }
}

/// Serializable view of a [`BuildReport`].
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
  pub goal: Goal,
  pub success: bool,
  pub rebuilt: Vec<PathBuf>,
  pub up_to_date: usize,
  pub rescanned: usize,
  pub failed: Vec<FailureSummary>,
  pub skipped: Vec<PathBuf>,
  pub cancelled: Vec<PathBuf>,
  pub invocations: usize,
  pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
  pub target: PathBuf,
  pub error: String,
  pub severity: i32,
}

/// Bring every artifact of `goal` up to date.
pub async fn build<R: CommandRunner>(
  config: Arc<BuildConfig>,
  runner: R,
  goal: Goal,
) -> Result<BuildReport, BuildError> {
  let start = Instant::now();
  let sources = discover(&config.layout)?;
  let ctx = Arc::new(ActionContext::new(Arc::clone(&config), runner));

  info!(goal = ?goal, platform = %config.platform, "starting build");

  let scan_graph = plan::scan_graph(&config, &sources, goal)?;
  let scan = run_graph(&scan_graph, &ctx).await?;

  if !scan.is_success() && config.failure_policy == FailurePolicy::FailFast {
    warn!(failed = scan.failed.len(), "dependency scan failed, not building");
    return Ok(BuildReport {
      goal,
      scan,
      build: None,
      invocations: ctx.executor.invocations(),
      elapsed: start.elapsed(),
    });
  }

  let build_graph = plan::build_graph(&config, &sources, goal, &scan)?;
  let build = run_graph(&build_graph, &ctx).await?;

  let report = BuildReport {
    goal,
    scan,
    build: Some(build),
    invocations: ctx.executor.invocations(),
    elapsed: start.elapsed(),
  };
  info!(
    success = report.is_success(),
    rebuilt = report.rebuilt().len(),
    invocations = report.invocations,
    "build finished"
  );
  Ok(report)
}

/// A tool as `info` reports it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
  pub kind: ToolKind,
  pub env: &'static str,
  pub command: String,
  pub overridden: bool,
  /// Absolute path found on `PATH`, if any.
  pub resolved: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedTarget {
  pub kind: TargetKind,
  pub path: PathBuf,
}

/// Everything `info` prints: resolved settings and the targets a full build
/// would produce. Nothing is built.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
  pub host: String,
  pub platform: PlatformTag,
  pub profile: Profile,
  pub output: PathBuf,
  pub tools: Vec<ToolInfo>,
  pub flags: ComposedFlags,
  pub sources: Sources,
  pub targets: Vec<PlannedTarget>,
}

pub fn describe(config: &BuildConfig) -> Result<ProjectInfo, BuildError> {
  let layout = &config.layout;
  let sources = discover(layout)?;

  let tools = config
    .tools
    .all()
    .into_iter()
    .map(|tool| ToolInfo {
      kind: tool.kind,
      env: tool.kind.env_var(),
      command: tool.command_line(),
      overridden: tool.overridden,
      resolved: tool.locate(),
    })
    .collect();

  let mut targets: Vec<PlannedTarget> = sources
    .library
    .iter()
    .map(|s| PlannedTarget {
      kind: TargetKind::Object,
      path: layout.object_path(s),
    })
    .collect();
  targets.push(PlannedTarget {
    kind: TargetKind::Library,
    path: layout.library_path(),
  });
  targets.extend(sources.executables.iter().map(|s| PlannedTarget {
    kind: TargetKind::Executable,
    path: layout.executable_path(s),
  }));
  targets.extend(sources.modules.iter().map(|s| PlannedTarget {
    kind: TargetKind::Module,
    path: layout.module_path(s),
  }));
  let mut links: Vec<PathBuf> = sources
    .modules
    .iter()
    .filter_map(|s| layout.module_path(s).parent().map(|dir| dir.join(layout.library_file_name())))
    .collect();
  links.sort();
  links.dedup();
  targets.extend(links.into_iter().map(|path| PlannedTarget {
    kind: TargetKind::LibraryLink,
    path,
  }));

  Ok(ProjectInfo {
    host: config.host.clone(),
    platform: config.platform,
    profile: config.profile,
    output: layout.platform_root.clone(),
    tools,
    flags: config.flags.clone(),
    sources,
    targets,
  })
}
