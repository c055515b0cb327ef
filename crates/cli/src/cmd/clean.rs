use std::time::Instant;

use anyhow::{Context, Result};

use cforge_lib::clean::{CleanResult, clean, distclean};
use cforge_lib::config::Layout;

use crate::cmd::{GlobalOpts, resolve_config};
use crate::output::{format_bytes, format_duration, print_info, print_json, print_stat, print_success, print_warning};

pub fn cmd_clean(opts: &GlobalOpts, dry_run: bool) -> Result<u8> {
  let start = Instant::now();
  let config = resolve_config(opts)?;

  let result = clean(&config, dry_run).context("Failed to clean build outputs")?;
  report(opts, &config.layout, &result, "Clean complete", start)
}

pub fn cmd_distclean(opts: &GlobalOpts, dry_run: bool) -> Result<u8> {
  let start = Instant::now();
  let config = resolve_config(opts)?;

  let result = distclean(&config, dry_run).context("Failed to remove output tree")?;
  report(opts, &config.layout, &result, "Output tree removed", start)
}

fn report(opts: &GlobalOpts, layout: &Layout, result: &CleanResult, done: &str, start: Instant) -> Result<u8> {
  if opts.output.is_json() {
    print_json(result)?;
  } else {
    if result.dry_run {
      for path in &result.removed {
        println!("  {}", layout.display_path(path));
      }
      println!();
      print_info("Dry run - no changes made");
    } else {
      print_success(done);
    }
    print_stat("Files removed", &result.stats.files_removed.to_string());
    print_stat("Directories removed", &result.stats.dirs_removed.to_string());
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  if result.stats.failures > 0 {
    print_warning(&format!("{} path(s) could not be removed", result.stats.failures));
    return Ok(1);
  }
  Ok(0)
}
