use std::sync::Arc;

use anyhow::{Context, Result};

use cforge_lib::build::{BuildReport, Goal, build};
use cforge_lib::config::Layout;
use cforge_lib::execute::{ProcessRunner, Verbosity};

use crate::cmd::{GlobalOpts, resolve_config};
use crate::output::{format_duration, print_error, print_json, print_stat, print_success, print_warning};

fn goal_name(goal: Goal) -> &'static str {
  match goal {
    Goal::All => "everything",
    Goal::Library => "library",
    Goal::Executables => "executables",
    Goal::Modules => "modules",
  }
}

/// Build `goal` and report. Returns the exit code: 0 on success, otherwise the
/// severity of the worst failure.
pub fn cmd_build(opts: &GlobalOpts, goal: Goal) -> Result<u8> {
  let config = Arc::new(resolve_config(opts)?);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(build(Arc::clone(&config), ProcessRunner, goal))
    .with_context(|| format!("Failed to build {}", goal_name(goal)))?;

  if opts.output.is_json() {
    print_json(&report.summary())?;
  } else {
    print_report(&report, &config.layout, opts.options.verbosity);
  }

  if report.is_success() {
    return Ok(0);
  }
  Ok(
    report
      .worst_failure()
      .map_or(1, |e| u8::try_from(e.severity()).unwrap_or(1)),
  )
}

fn print_report(report: &BuildReport, layout: &Layout, verbosity: Verbosity) {
  for (path, err) in report.failures() {
    print_error(&format!("{}: {}", layout.display_path(path), err));
  }

  let summary = report.summary();
  for path in &summary.skipped {
    print_warning(&format!("skipped {} (a prerequisite failed)", layout.display_path(path)));
  }
  if !summary.cancelled.is_empty() {
    print_warning(&format!("{} target(s) not started after the first failure", summary.cancelled.len()));
  }

  if verbosity == Verbosity::Quiet {
    return;
  }

  println!();
  if report.is_success() {
    if summary.invocations == 0 {
      print_success(&format!("Nothing to do: {} is up to date", goal_name(report.goal)));
    } else {
      print_success(&format!("Built {}", goal_name(report.goal)));
    }
  } else {
    print_error(&format!("Build of {} failed", goal_name(report.goal)));
  }
  print_stat("Rebuilt", &summary.rebuilt.len().to_string());
  print_stat("Up to date", &summary.up_to_date.to_string());
  print_stat("Rescanned", &summary.rescanned.to_string());
  print_stat("Commands", &summary.invocations.to_string());
  if !summary.failed.is_empty() {
    print_stat("Failed", &summary.failed.len().to_string());
  }
  print_stat("Duration", &format_duration(report.elapsed));
}
