//! Build graph execution.
//!
//! This module drives a [`BuildGraph`] to completion. It handles:
//! - wave ordering (every prerequisite finishes before its dependents start)
//! - bounded parallelism within a wave
//! - timestamp staleness, plus "a prerequisite was rebuilt in this run"
//! - failure propagation, skip tracking and fail-fast cancellation

pub mod actions;
pub mod command;
pub mod dag;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use petgraph::graph::NodeIndex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::FailurePolicy;
use crate::staleness::{is_stale, mtime};

pub use actions::{ActionContext, ProcessRunner, RuleOutcome, execute_rule};
pub use command::{CommandError, CommandExecutor, CommandOutput, CommandRunner, Invocation, Step, Verbosity};
pub use dag::{BuildGraph, Rule, Target, TargetKind};
pub use types::{BuildError, GraphResult};

/// Per-node state once a node has been visited.
#[derive(Debug, Clone, Copy)]
enum NodeState {
  /// Exists and is usable. `None` means "changed in this run" or "absent but
  /// optional"; either way dependents must rebuild.
  Current(Option<SystemTime>),
  /// Failed, skipped, cancelled or poisoned.
  NotBuilt,
}

/// What a spawned rule task reports back.
enum TaskOutcome {
  Built,
  Unchanged,
  Cancelled,
  Failed(BuildError),
}

/// Execute every rule in `graph` whose target is stale.
pub async fn run_graph<R: CommandRunner>(
  graph: &BuildGraph,
  ctx: &Arc<ActionContext<R>>,
) -> Result<GraphResult, BuildError> {
  graph.verify_acyclic()?;
  let waves = graph.execution_waves()?;
  let fail_fast = ctx.config.failure_policy == FailurePolicy::FailFast;

  info!(targets = graph.len(), waves = waves.len(), jobs = ctx.config.jobs, "executing build graph");

  let mut result = GraphResult::default();
  let mut states: HashMap<NodeIndex, NodeState> = HashMap::new();
  let semaphore = Arc::new(Semaphore::new(ctx.config.jobs));
  let abort = Arc::new(AtomicBool::new(false));

  for (wave_idx, wave) in waves.iter().enumerate() {
    if abort.load(Ordering::SeqCst) {
      break;
    }
    debug!(wave = wave_idx, nodes = wave.len(), "executing wave");

    let mut join_set = JoinSet::new();
    let mut spawned: HashMap<tokio::task::Id, NodeIndex> = HashMap::new();

    for &idx in wave {
      let target = graph.target(idx);

      // Any prerequisite not built means this node is not attempted.
      let prereqs = graph.prerequisites(idx);
      if let Some(bad) = prereqs
        .iter()
        .find(|p| matches!(states.get(*p), Some(NodeState::NotBuilt) | None))
      {
        let cause = graph.target(*bad).path.clone();
        if target.rule.is_some() {
          warn!(target = %target.path.display(), prerequisite = %cause.display(), "skipping target, prerequisite not built");
          result.skipped.insert(target.path.clone(), cause);
        }
        states.insert(idx, NodeState::NotBuilt);
        continue;
      }

      let current = mtime(&target.path).map_err(|e| BuildError::io(&target.path, e))?;

      let Some(rule) = &target.rule else {
        let state = leaf_state(target, current, &mut result, &abort, fail_fast);
        states.insert(idx, state);
        continue;
      };

      let prereq_times: Vec<Option<SystemTime>> = prereqs
        .iter()
        .map(|p| match states.get(p) {
          Some(NodeState::Current(t)) => *t,
          _ => None,
        })
        .collect();

      if !target.always && !is_stale(current, &prereq_times) {
        result.up_to_date.push(target.path.clone());
        states.insert(idx, NodeState::Current(current));
        continue;
      }

      let ctx = Arc::clone(ctx);
      let semaphore = Arc::clone(&semaphore);
      let abort = Arc::clone(&abort);
      let path = target.path.clone();
      let rule = rule.clone();

      let handle = join_set.spawn(async move {
        let Ok(_permit) = semaphore.acquire().await else {
          return TaskOutcome::Cancelled;
        };
        if abort.load(Ordering::SeqCst) {
          return TaskOutcome::Cancelled;
        }
        match execute_rule(&ctx, &path, &rule).await {
          Ok(RuleOutcome::Rebuilt) => TaskOutcome::Built,
          Ok(RuleOutcome::Unchanged) => TaskOutcome::Unchanged,
          Err(e) => {
            if fail_fast {
              abort.store(true, Ordering::SeqCst);
            }
            TaskOutcome::Failed(e)
          }
        }
      });
      spawned.insert(handle.id(), idx);
    }

    collect_wave(graph, join_set, &spawned, &mut states, &mut result).await;
  }

  // Nodes never reached because fail-fast stopped the run.
  if abort.load(Ordering::SeqCst) {
    for idx in waves.iter().flatten() {
      if states.contains_key(idx) {
        continue;
      }
      let target = graph.target(*idx);
      if target.rule.is_some() {
        result.cancelled.push(target.path.clone());
      }
    }
  }

  info!(
    rebuilt = result.rebuilt.len(),
    up_to_date = result.up_to_date.len(),
    failed = result.failed.len(),
    skipped = result.skipped.len(),
    cancelled = result.cancelled.len(),
    "build graph complete"
  );

  Ok(result)
}

/// State of a node that has no rule.
fn leaf_state(
  target: &Target,
  current: Option<SystemTime>,
  result: &mut GraphResult,
  abort: &AtomicBool,
  fail_fast: bool,
) -> NodeState {
  if target.poisoned {
    return NodeState::NotBuilt;
  }
  match current {
    Some(_) if target.changed => NodeState::Current(None),
    Some(t) => NodeState::Current(Some(t)),
    None if target.optional => {
      debug!(path = %target.path.display(), "optional prerequisite is gone, treating as changed");
      NodeState::Current(None)
    }
    None => {
      error!(path = %target.path.display(), "missing prerequisite");
      result.failed.push((
        target.path.clone(),
        BuildError::MissingPrerequisite {
          path: target.path.clone(),
        },
      ));
      if fail_fast {
        abort.store(true, Ordering::SeqCst);
      }
      NodeState::NotBuilt
    }
  }
}

/// Wait for every task in a wave and record its outcome.
async fn collect_wave(
  graph: &BuildGraph,
  mut join_set: JoinSet<TaskOutcome>,
  spawned: &HashMap<tokio::task::Id, NodeIndex>,
  states: &mut HashMap<NodeIndex, NodeState>,
  result: &mut GraphResult,
) {
  while let Some(joined) = join_set.join_next_with_id().await {
    let (id, outcome) = match joined {
      Ok((id, outcome)) => (id, outcome),
      Err(e) => {
        error!(error = %e, "build task panicked");
        let id = e.id();
        let outcome = TaskOutcome::Failed(BuildError::io(
          spawned.get(&id).map(|idx| graph.target(*idx).path.clone()).unwrap_or_default(),
          std::io::Error::other(e.to_string()),
        ));
        (id, outcome)
      }
    };
    let Some(&idx) = spawned.get(&id) else {
      continue;
    };
    let path: PathBuf = graph.target(idx).path.clone();

    match outcome {
      TaskOutcome::Built => {
        debug!(target = %path.display(), "target rebuilt");
        result.rebuilt.push(path);
        states.insert(idx, NodeState::Current(None));
      }
      TaskOutcome::Unchanged => {
        debug!(target = %path.display(), "target unchanged");
        states.insert(idx, NodeState::Current(mtime(&path).ok().flatten()));
        result.up_to_date.push(path);
      }
      TaskOutcome::Cancelled => {
        result.cancelled.push(path);
        states.insert(idx, NodeState::NotBuilt);
      }
      TaskOutcome::Failed(e) => {
        error!(target = %path.display(), error = %e, "target failed");
        result.failed.push((path, e));
        states.insert(idx, NodeState::NotBuilt);
      }
    }
  }
}
