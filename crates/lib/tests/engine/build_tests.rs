use cforge_lib::build::Goal;
use cforge_lib::config::{FailurePolicy, Profile, ScanPolicy, ScanStrategy};
use cforge_lib::execute::{BuildError, Step};

use super::common::sample_project;

#[tokio::test]
async fn first_build_produces_every_artifact() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 4);

  let report = project.build(&config, Goal::All).await;

  assert!(report.is_success(), "{:?}", report.summary());
  let layout = &config.layout;
  assert!(layout.library_path().is_file());
  assert!(layout.bin_dir().join("sift").is_file());
  assert!(layout.bin_dir().join("mser").is_file());
  assert!(layout.mod_dir().join("vl_version.mexa64").is_file());
  assert!(layout.mod_dir().join("sift/vl_sift.mexa64").is_file());
  assert!(layout.mod_dir().join("libvl.so").exists());
  assert!(layout.mod_dir().join("sift/libvl.so").exists());
  // 5 objects, 1 library, 2 executables, 2 modules.
  assert_eq!(report.invocations, 10);
}

#[tokio::test]
async fn second_build_runs_nothing() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 2);
  project.build(&config, Goal::All).await;
  project.toolchain.clear();

  let report = project.build(&config, Goal::All).await;

  assert!(report.is_success());
  assert_eq!(report.invocations, 0);
  assert!(project.toolchain.steps().is_empty());
  assert!(report.rebuilt().is_empty());
}

#[tokio::test]
async fn touching_a_shared_header_rebuilds_only_its_includers() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 1);
  project.build(&config, Goal::All).await;
  project.toolchain.clear();

  project.touch_ahead("vl/generic.h", 60);
  let report = project.build(&config, Goal::All).await;

  assert!(report.is_success());
  let tc = &project.toolchain;
  assert_eq!(
    tc.targets_of(Step::Compile),
    vec![
      "build/glnxa64/obj/hog.o",
      "build/glnxa64/obj/mser.o",
      "build/glnxa64/obj/sift.o",
    ]
  );
  assert_eq!(tc.targets_of(Step::LinkLibrary), vec!["build/glnxa64/bin/libvl.so"]);
  assert_eq!(tc.targets_of(Step::LinkExecutable).len(), 2);
  assert_eq!(tc.targets_of(Step::BuildModule).len(), 2);
  // Builtin scanning never runs a command.
  assert!(tc.targets_of(Step::Scan).is_empty());
}

#[tokio::test]
async fn touching_a_driver_rebuilds_only_that_executable() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 1);
  project.build(&config, Goal::All).await;
  project.toolchain.clear();

  project.touch_ahead("src/mser.c", 60);
  let report = project.build(&config, Goal::All).await;

  assert!(report.is_success());
  assert_eq!(
    project.toolchain.steps(),
    vec![(Step::LinkExecutable, "build/glnxa64/bin/mser".to_string())]
  );
}

#[tokio::test]
async fn newly_included_header_becomes_a_prerequisite() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 1);
  project.build(&config, Goal::Library).await;

  project.write("vl/extra.h", "\n");
  project.write("vl/random.c", "#include \"extra.h\"\nint r;\n");
  project.touch_ahead("vl/random.c", 30);
  project.build(&config, Goal::Library).await;

  project.touch_back("vl/random.c", 3600);
  project.touch_ahead("vl/extra.h", 60);
  project.toolchain.clear();
  project.build(&config, Goal::Library).await;

  assert_eq!(
    project.toolchain.targets_of(Step::Compile),
    vec!["build/glnxa64/obj/random.o"]
  );
}

#[tokio::test]
async fn changing_profile_recompiles_everything() {
  let project = sample_project();
  let release = project.config(FailurePolicy::FailFast, 1);
  project.build(&release, Goal::Library).await;
  project.toolchain.clear();

  let debug = project.config_with(FailurePolicy::FailFast, 1, Profile::Debug);
  let report = project.build(&debug, Goal::Library).await;

  assert!(report.is_success());
  assert_eq!(report.scan.rebuilt.len(), 5, "every record has a stale flags digest");
  assert_eq!(project.toolchain.targets_of(Step::Compile).len(), 5);
}

#[tokio::test]
async fn library_goal_builds_no_dependents() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 2);

  let report = project.build(&config, Goal::Library).await;

  assert!(report.is_success());
  assert!(config.layout.library_path().is_file());
  assert!(!config.layout.bin_dir().join("sift").exists());
  assert!(!config.layout.mod_dir().exists());
}

#[tokio::test]
async fn keep_going_builds_every_other_executable() {
  let project = sample_project();
  project.write("src/hog.c", "int main(void) { return 0; }\n");
  project.write("src/kdtree.c", "int main(void) { return 0; }\n");
  project.toolchain.fail_on("bin/hog");
  let config = project.config(FailurePolicy::KeepGoing, 1);

  let report = project.build(&config, Goal::Executables).await;

  assert!(!report.is_success());
  let failures: Vec<_> = report.failures().collect();
  assert_eq!(failures.len(), 1);
  assert!(matches!(failures[0].1, BuildError::CompileFailure { .. }));
  let bin = config.layout.bin_dir();
  for built in ["kdtree", "mser", "sift"] {
    assert!(bin.join(built).is_file(), "{built} should have been built");
  }
  assert!(!bin.join("hog").exists());
  assert!(!bin.join(".hog.partial").exists());
}

#[tokio::test]
async fn fail_fast_with_one_worker_starts_no_further_siblings() {
  let project = sample_project();
  project.write("src/hog.c", "int main(void) { return 0; }\n");
  project.write("src/kdtree.c", "int main(void) { return 0; }\n");
  project.toolchain.fail_on("bin/hog");
  let config = project.config(FailurePolicy::FailFast, 1);

  let report = project.build(&config, Goal::Executables).await;

  assert!(!report.is_success());
  let linked = project.toolchain.targets_of(Step::LinkExecutable);
  assert_eq!(linked, vec!["build/glnxa64/bin/hog"]);
  let build = report.build.as_ref().unwrap();
  assert_eq!(build.cancelled.len(), 3);
  assert!(report.summary().cancelled.iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn library_failure_skips_every_dependent() {
  let project = sample_project();
  project.toolchain.fail_on("libvl");
  let config = project.config(FailurePolicy::KeepGoing, 4);

  let report = project.build(&config, Goal::All).await;

  assert!(!report.is_success());
  assert!(matches!(report.worst_failure(), Some(BuildError::LinkFailure { .. })));
  let summary = report.summary();
  assert_eq!(summary.skipped.len(), 4, "two executables and two modules");
  assert!(project.toolchain.targets_of(Step::LinkExecutable).is_empty());
}

#[tokio::test]
async fn strict_scanning_leaves_an_unchanged_tree_alone() {
  let project = sample_project();
  let config = project.config_scanning(ScanStrategy::Builtin, ScanPolicy::Strict);
  let first = project.build(&config, Goal::All).await;
  assert!(first.is_success(), "{:?}", first.summary());
  project.toolchain.clear();

  let second = project.build(&config, Goal::All).await;

  assert!(second.is_success());
  assert_eq!(second.invocations, 0);
  assert!(second.scan.rebuilt.is_empty(), "{:?}", second.scan.rebuilt);
  assert!(second.rebuilt().is_empty(), "{:?}", second.rebuilt());
}

#[tokio::test]
async fn strict_compiler_scanning_reruns_scans_only() {
  let project = sample_project();
  let config = project.config_scanning(ScanStrategy::Compiler, ScanPolicy::Strict);
  project.build(&config, Goal::All).await;
  project.toolchain.clear();

  let second = project.build(&config, Goal::All).await;

  assert!(second.is_success());
  let steps = project.toolchain.steps();
  assert_eq!(steps.len(), 9, "one scan per source");
  assert!(steps.iter().all(|(step, _)| *step == Step::Scan));
  assert!(second.rebuilt().is_empty());
}

#[tokio::test]
async fn compiler_scanning_builds_everything_then_idles() {
  let project = sample_project();
  let config = project.config_scanning(ScanStrategy::Compiler, ScanPolicy::Conservative);

  let first = project.build(&config, Goal::All).await;

  assert!(first.is_success(), "{:?}", first.summary());
  assert_eq!(project.toolchain.targets_of(Step::Scan).len(), 9);
  assert_eq!(first.invocations, 19);
  assert!(config.layout.mod_dir().join("sift/libvl.so").exists());

  project.toolchain.clear();
  let second = project.build(&config, Goal::All).await;
  assert_eq!(second.invocations, 0);

  project.touch_ahead("vl/host.h", 60);
  let third = project.build(&config, Goal::Library).await;
  assert!(third.is_success());
  assert_eq!(
    project.toolchain.targets_of(Step::Compile),
    vec!["build/glnxa64/obj/kdtree.o", "build/glnxa64/obj/mser.o"]
  );
}

#[tokio::test]
async fn rescanned_record_with_new_header_recompiles_in_the_same_run() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 1);
  project.build(&config, Goal::Library).await;
  project.toolchain.clear();

  // Same mtime as before, so only the rewritten record says anything changed.
  let source = project.root().join("vl/random.c");
  let built_at = std::fs::metadata(&source).unwrap().modified().unwrap();
  project.write("vl/extra.h", "\n");
  project.write("vl/random.c", "#include \"extra.h\"\nint r;\n");
  project.touch_back("vl/extra.h", 3600);
  let record = config
    .layout
    .record_path(cforge_lib::config::ArtifactKind::Library, &source);
  std::fs::File::options()
    .write(true)
    .open(&source)
    .unwrap()
    .set_modified(built_at)
    .unwrap();
  std::fs::File::options()
    .write(true)
    .open(&record)
    .unwrap()
    .set_modified(built_at - std::time::Duration::from_secs(1))
    .unwrap();

  let report = project.build(&config, Goal::Library).await;

  assert!(report.is_success());
  assert_eq!(report.scan.rebuilt, vec![record]);
  assert_eq!(
    project.toolchain.targets_of(Step::Compile),
    vec!["build/glnxa64/obj/random.o"]
  );
}
