use cforge_lib::build::Goal;
use cforge_lib::clean::{CleanError, clean, distclean};
use cforge_lib::config::FailurePolicy;

use super::common::sample_project;

#[tokio::test]
async fn distclean_then_build_reproduces_every_artifact() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 2);
  let first = project.build(&config, Goal::All).await;
  let mut before = first.rebuilt().to_vec();
  before.sort();

  let removed = distclean(&config, false).unwrap();
  assert!(!removed.removed.is_empty());
  assert!(!config.layout.output_root.exists());
  assert!(project.root().join("vl/sift.c").exists());

  let second = project.build(&config, Goal::All).await;
  let mut after = second.rebuilt().to_vec();
  after.sort();

  assert!(second.is_success());
  assert_eq!(before, after);
  assert!(config.layout.mod_dir().join("sift/libvl.so").exists());
}

#[tokio::test]
async fn clean_forces_a_full_rebuild() {
  let project = sample_project();
  let config = project.config(FailurePolicy::FailFast, 2);
  let first = project.build(&config, Goal::All).await;

  let result = clean(&config, false).unwrap();
  assert_eq!(result.stats.failures, 0);
  assert!(!config.layout.library_path().exists());
  assert!(!config.layout.mod_dir().join("libvl.so").exists());

  let second = project.build(&config, Goal::All).await;
  assert!(second.is_success());
  assert_eq!(second.invocations, first.invocations);
}

#[test]
fn output_root_folding_back_onto_the_project_is_never_removed() {
  let project = sample_project();
  project.write("cforge.toml", "output = \"vl/..\"\n");
  let config = project.config(FailurePolicy::FailFast, 1);

  assert!(matches!(distclean(&config, false), Err(CleanError::OutsideProject { .. })));
  assert!(matches!(distclean(&config, true), Err(CleanError::OutsideProject { .. })));
  assert!(project.root().join("vl/sift.c").exists());
  assert!(project.root().join("cforge.toml").exists());
}

#[test]
fn output_root_beside_the_project_is_never_removed() {
  let project = sample_project();
  project.write("cforge.toml", "output = \"./toolbox/../../elsewhere\"\n");
  let config = project.config(FailurePolicy::FailFast, 1);

  assert!(matches!(clean(&config, false), Err(CleanError::OutsideProject { .. })));
  assert!(matches!(distclean(&config, false), Err(CleanError::OutsideProject { .. })));
  assert!(project.root().join("toolbox/vl_version.c").exists());
}
