//! Shared helpers for engine tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use cforge_lib::build::{BuildReport, Goal, build};
use cforge_lib::config::{BuildConfig, BuildOptions, FailurePolicy, Profile, ScanPolicy, ScanStrategy};
use cforge_lib::execute::{CommandError, CommandOutput, CommandRunner, Invocation, Step, Verbosity};
use tempfile::TempDir;

/// Toolchain stand-in: records every invocation and writes its `-o` output.
#[derive(Debug, Clone, Default)]
pub struct FakeToolchain {
  calls: Arc<Mutex<Vec<Invocation>>>,
  failing: Arc<Mutex<Vec<String>>>,
}

impl FakeToolchain {
  /// Fail every command whose target contains `fragment`.
  pub fn fail_on(&self, fragment: &str) {
    self.failing.lock().unwrap().push(fragment.to_string());
  }

  pub fn clear(&self) {
    self.calls.lock().unwrap().clear();
  }

  /// `(step, target)` for every call since the last `clear`.
  pub fn steps(&self) -> Vec<(Step, String)> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .map(|inv| (inv.step, inv.target.clone()))
      .collect()
  }

  pub fn targets_of(&self, step: Step) -> Vec<String> {
    let mut targets: Vec<String> = self
      .steps()
      .into_iter()
      .filter(|(s, _)| *s == step)
      .map(|(_, t)| t)
      .collect();
    targets.sort();
    targets
  }
}

impl CommandRunner for FakeToolchain {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
    self.calls.lock().unwrap().push(invocation.clone());

    let fails = self
      .failing
      .lock()
      .unwrap()
      .iter()
      .any(|f| invocation.target.contains(f.as_str()));
    if fails {
      return Ok(CommandOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: format!("{}:1: error: forced failure", invocation.target),
      });
    }

    if invocation.step == Step::Scan {
      return Ok(CommandOutput {
        code: Some(0),
        stdout: make_rule(invocation),
        stderr: String::new(),
      });
    }

    if let Some(out) = invocation.output() {
      std::fs::write(invocation.cwd.join(out), invocation.command_line()).unwrap();
    }
    Ok(CommandOutput {
      code: Some(0),
      ..CommandOutput::default()
    })
  }
}

/// What `cc -MM -MT <artifact> <source>` prints, following quoted includes
/// one level deep from the source's directory.
fn make_rule(invocation: &Invocation) -> String {
  let source = PathBuf::from(invocation.args.last().unwrap());
  let dir = source.parent().unwrap();
  let mut rule = format!("{}: {}", invocation.args[2], source.display());
  for line in std::fs::read_to_string(&source).unwrap().lines() {
    let quoted = line.trim().strip_prefix("#include \"").and_then(|rest| rest.strip_suffix('"'));
    if let Some(name) = quoted {
      rule.push_str(&format!(" \\\n  {}", dir.join(name).display()));
    }
  }
  rule.push('\n');
  rule
}

/// A project tree in a temporary directory.
pub struct Project {
  pub temp: TempDir,
  pub toolchain: FakeToolchain,
}

impl Project {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
      toolchain: FakeToolchain::default(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
    let path = self.root().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
  }

  /// Move a file's modification time `secs` into the future.
  pub fn touch_ahead(&self, rel: &str, secs: u64) {
    self.set_mtime(rel, SystemTime::now() + Duration::from_secs(secs));
  }

  /// Move a file's modification time `secs` into the past.
  pub fn touch_back(&self, rel: &str, secs: u64) {
    self.set_mtime(rel, SystemTime::now() - Duration::from_secs(secs));
  }

  fn set_mtime(&self, rel: &str, time: SystemTime) {
    let file = std::fs::File::options().write(true).open(self.root().join(rel)).unwrap();
    file.set_modified(time).unwrap();
  }

  pub fn config(&self, policy: FailurePolicy, jobs: usize) -> Arc<BuildConfig> {
    self.config_with(policy, jobs, Profile::Release)
  }

  pub fn config_with(&self, policy: FailurePolicy, jobs: usize, profile: Profile) -> Arc<BuildConfig> {
    self.resolve(BuildOptions {
      profile,
      jobs,
      failure_policy: policy,
      ..BuildOptions::default()
    })
  }

  pub fn config_scanning(&self, strategy: ScanStrategy, policy: ScanPolicy) -> Arc<BuildConfig> {
    self.resolve(BuildOptions {
      scan_strategy: strategy,
      scan_policy: policy,
      ..BuildOptions::default()
    })
  }

  /// Quiet configuration on 64-bit Linux with `options` otherwise.
  fn resolve(&self, options: BuildOptions) -> Arc<BuildConfig> {
    let options = BuildOptions {
      host: Some("Linux x86_64".to_string()),
      verbosity: Verbosity::Quiet,
      ..options
    };
    Arc::new(BuildConfig::resolve(self.root(), options).unwrap())
  }

  pub async fn build(&self, config: &Arc<BuildConfig>, goal: Goal) -> BuildReport {
    build(Arc::clone(config), self.toolchain.clone(), goal).await.unwrap()
  }
}

/// Five library sources, three of which share `vl/generic.h`; two drivers
/// and two modules.
pub fn sample_project() -> Project {
  let project = Project::new();
  project.write("vl/generic.h", "#define VL_VERSION 1\n");
  project.write("vl/host.h", "\n");
  project.write("vl/sift.c", "#include \"generic.h\"\n");
  project.write("vl/mser.c", "#include \"generic.h\"\n#include \"host.h\"\n");
  project.write("vl/hog.c", "#include \"generic.h\"\n");
  project.write("vl/kdtree.c", "#include \"host.h\"\n");
  project.write("vl/random.c", "int r;\n");
  project.write("src/sift.c", "int main(void) { return 0; }\n");
  project.write("src/mser.c", "int main(void) { return 0; }\n");
  project.write("toolbox/vl_version.c", "\n");
  project.write("toolbox/sift/vl_sift.c", "\n");
  project
}
