use anyhow::{Context, Result};

use cforge_lib::build::describe;
use cforge_lib::config::ArtifactKind;

use crate::cmd::{GlobalOpts, resolve_config};
use crate::output::{print_heading, print_item, print_json, print_stat};

pub fn cmd_info(opts: &GlobalOpts) -> Result<u8> {
  let config = resolve_config(opts)?;
  let info = describe(&config).context("Failed to inspect project")?;

  if opts.output.is_json() {
    print_json(&info)?;
    return Ok(0);
  }

  let layout = &config.layout;
  println!("cforge v{}", env!("CARGO_PKG_VERSION"));
  print_stat("Platform", info.platform.as_str());
  print_stat("Host", &info.host);
  print_stat("Profile", &format!("{:?}", info.profile).to_lowercase());
  print_stat("Output", &info.output.display().to_string());

  print_heading("Tools");
  for tool in &info.tools {
    let location = match &tool.resolved {
      Some(path) => path.display().to_string(),
      None => "not found".to_string(),
    };
    let origin = if tool.overridden { format!(" (from {})", tool.env) } else { String::new() };
    print_item(tool.env, &format!("{} [{}]{}", tool.command, location, origin));
  }

  print_heading("Flags");
  for kind in ArtifactKind::ALL {
    let set = info.flags.get(kind);
    print_item(kind.as_str(), &format!("compile: {}", set.compile.join(" ")));
    print_item(kind.as_str(), &format!("link: {}", set.link.join(" ")));
  }

  print_heading("Sources");
  for kind in ArtifactKind::ALL {
    print_stat(kind.as_str(), &info.sources.get(kind).len().to_string());
  }

  print_heading("Targets");
  for target in &info.targets {
    print_item(
      &format!("{:?}", target.kind).to_lowercase(),
      &layout.display_path(&target.path),
    );
  }

  Ok(0)
}
