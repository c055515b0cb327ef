mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use cforge_lib::build::Goal;
use cforge_lib::config::{BuildOptions, FailurePolicy, Profile, ScanPolicy, ScanStrategy};
use cforge_lib::execute::Verbosity;

use crate::cmd::GlobalOpts;
use crate::output::{OutputFormat, print_error};

/// cforge - incremental builds for a C library, its drivers and extension modules
#[derive(Parser)]
#[command(name = "cforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Project directory (contains cforge.toml or the default source layout)
  #[arg(short = 'C', long = "project", global = true, default_value = ".")]
  project: PathBuf,

  /// Host description to build for, e.g. "Linux x86_64" (default: CFORGE_HOST or detected)
  #[arg(long, global = true)]
  host: Option<String>,

  /// Build without optimization and with debug symbols
  #[arg(long, global = true)]
  debug: bool,

  /// Number of commands to run concurrently
  #[arg(short, long, global = true, default_value_t = 1)]
  jobs: usize,

  /// Keep building unaffected targets after a failure
  #[arg(short = 'k', long, global = true)]
  keep_going: bool,

  /// Print full command lines (-vv adds engine logs)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Print nothing but errors
  #[arg(short, long, global = true, conflicts_with = "verbose")]
  quiet: bool,

  /// How included headers are discovered
  #[arg(long, global = true, value_enum, default_value_t)]
  scan: ScanArg,

  /// Rescan every source's headers on every build
  #[arg(long, global = true)]
  strict_deps: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ScanArg {
  /// Follow #include directives without running the compiler
  #[default]
  Builtin,
  /// Ask the compiler for dependencies (-MM)
  Compiler,
}

impl From<ScanArg> for ScanStrategy {
  fn from(arg: ScanArg) -> Self {
    match arg {
      ScanArg::Builtin => ScanStrategy::Builtin,
      ScanArg::Compiler => ScanStrategy::Compiler,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Build the library, every driver program and every module
  BuildAll,

  /// Build only the shared library
  BuildLibrary,

  /// Build the library and the driver programs
  BuildExecutables,

  /// Build the library and the extension modules
  BuildModules,

  /// Remove objects, dependency records and built artifacts for this platform
  Clean {
    /// Show what would be removed without removing anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Remove the whole output tree, for every platform
  Distclean {
    /// Show what would be removed without removing anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Show the resolved platform, tools, flags and planned targets
  Info,
}

impl Cli {
  fn verbosity(&self) -> Verbosity {
    // Progress lines would corrupt a JSON document on stdout.
    if self.quiet || self.output.is_json() {
      Verbosity::Quiet
    } else if self.verbose > 0 {
      Verbosity::Verbose
    } else {
      Verbosity::Normal
    }
  }

  fn global_opts(&self) -> GlobalOpts {
    let options = BuildOptions {
      host: self.host.clone(),
      profile: if self.debug { Profile::Debug } else { Profile::Release },
      jobs: self.jobs,
      failure_policy: if self.keep_going {
        FailurePolicy::KeepGoing
      } else {
        FailurePolicy::FailFast
      },
      scan_strategy: self.scan.into(),
      scan_policy: if self.strict_deps {
        ScanPolicy::Strict
      } else {
        ScanPolicy::Conservative
      },
      verbosity: self.verbosity(),
    };
    GlobalOpts {
      project: self.project.clone(),
      output: self.output,
      options,
    }
  }
}

fn init_tracing(verbose: u8, quiet: bool) {
  let default = match (quiet, verbose) {
    (true, _) => "error",
    (false, 0 | 1) => "warn",
    (false, 2) => "info",
    (false, _) => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose, cli.quiet);

  let opts = cli.global_opts();
  let result = match cli.command {
    Commands::BuildAll => cmd::cmd_build(&opts, Goal::All),
    Commands::BuildLibrary => cmd::cmd_build(&opts, Goal::Library),
    Commands::BuildExecutables => cmd::cmd_build(&opts, Goal::Executables),
    Commands::BuildModules => cmd::cmd_build(&opts, Goal::Modules),
    Commands::Clean { dry_run } => cmd::cmd_clean(&opts, dry_run),
    Commands::Distclean { dry_run } => cmd::cmd_distclean(&opts, dry_run),
    Commands::Info => cmd::cmd_info(&opts),
  };

  match result {
    Ok(code) => ExitCode::from(code),
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::from(cmd::exit_code(&err))
    }
  }
}
