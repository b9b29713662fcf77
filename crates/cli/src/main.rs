use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use oftb_bootstrap_lib::{BootstrapConfig, ToolchainSource, config};

mod cmd;
mod output;

use cmd::{cmd_bootstrap, cmd_fixpoint, cmd_package, cmd_self_test};
use output::{OutputFormat, print_error};

/// oftb-boot - Bootstrap and verify the self-hosted oftb toolchain
#[derive(Parser)]
#[command(name = "oftb-boot")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Root of the oftb source tree (default: $OFTB_BOOTSTRAP_ROOT or the current directory)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Reuse target/release/oftb instead of building it
  #[arg(long, global = true)]
  no_toolchain_build: bool,

  /// Use the oftb found on PATH
  #[arg(long, global = true, conflicts_with = "toolchain")]
  use_system_toolchain: bool,

  /// Use this pre-built oftb binary
  #[arg(long, global = true)]
  toolchain: Option<PathBuf>,

  /// Echo every command line and enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Do not pass -v to the toolchain
  #[arg(long, global = true)]
  quiet_toolchain: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the toolchain, run the whole bootstrap and package the result (default)
  Bootstrap(BootstrapArgs),

  /// Only run the triple-compile fixpoint check and promote the result
  Fixpoint,

  /// Only run the macro-expander self-test
  SelfTest {
    /// Drive the expander through its promoted artifact instead of from source
    #[arg(long)]
    prebuilt: bool,
  },

  /// Only write the distribution archive
  Package {
    /// Archive path (default: <root>/oftb.tar.gz)
    #[arg(long)]
    archive: Option<PathBuf>,
  },
}

#[derive(Args, Default)]
struct BootstrapArgs {
  /// Skip writing the distribution archive
  #[arg(long)]
  no_archive: bool,

  /// Archive path (default: <root>/oftb.tar.gz)
  #[arg(long, conflicts_with = "no_archive")]
  archive: Option<PathBuf>,

  /// Additional macro-expander entry point to compile after promotion (repeatable)
  #[arg(long = "aux", value_name = "BINARY")]
  aux: Vec<String>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let mut config = load_config(&cli)?;
  let output = cli.output;

  match cli.command.unwrap_or(Commands::Bootstrap(BootstrapArgs::default())) {
    Commands::Bootstrap(args) => {
      config.aux_binaries = args.aux;
      let archive = (!args.no_archive).then_some(args.archive);
      cmd_bootstrap(config, archive, output)
    }
    Commands::Fixpoint => cmd_fixpoint(config, output),
    Commands::SelfTest { prebuilt } => cmd_self_test(config, prebuilt, output),
    Commands::Package { archive } => cmd_package(config, archive, output),
  }
}

fn load_config(cli: &Cli) -> Result<BootstrapConfig> {
  let root = match &cli.root {
    Some(root) => root.clone(),
    None => config::default_root().context("Failed to determine pipeline root")?,
  };
  let root = dunce::canonicalize(&root).with_context(|| format!("Pipeline root not found: {}", root.display()))?;

  let mut config = BootstrapConfig::new(&root);
  config.toolchain = ToolchainSource::select(
    &root,
    cli.use_system_toolchain,
    cli.toolchain.clone(),
    cli.no_toolchain_build,
  );
  // Toolchain commands run from the root, so relative paths must be resolved here.
  if let ToolchainSource::Prebuilt(path) = &mut config.toolchain
    && let Ok(absolute) = dunce::canonicalize(&*path)
  {
    *path = absolute;
  }
  config.echo = cli.verbose;
  config.toolchain_verbose = !cli.quiet_toolchain;
  debug!(root = %config.root.display(), toolchain = ?config.toolchain, "configuration loaded");

  Ok(config)
}
