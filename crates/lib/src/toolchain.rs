//! The oftb toolchain command surface.
//!
//! [`Toolchain`] knows how to spell the three toolchain operations on the
//! command line and how to build the toolchain itself with cargo. It does not
//! interpret results; exit codes are checked by the [`Invoker`].
//!
//! ```text
//! oftb [-v] compile   --std <std> <package> <binary>
//! oftb [-v] interpret <package>/build/<binary>.ofta [args...]
//! oftb [-v] run       --std <std> <package> <binary> [args...]
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{ArtifactKey, ArtifactRef};
use crate::config::BootstrapConfig;
use crate::process::{Capture, Invocation, Invoker, Output, ProcessError, Runner, SystemRunner};

/// Cargo profile for native builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
  Debug,
  Release,
}

/// Handle on the native toolchain binary.
#[derive(Debug, Clone)]
pub struct Toolchain<R = SystemRunner> {
  invoker: Invoker<R>,
  executable: PathBuf,
  std_package: String,
  root: PathBuf,
  verbose: bool,
}

impl<R: Runner> Toolchain<R> {
  pub fn new(invoker: Invoker<R>, executable: impl Into<PathBuf>, config: &BootstrapConfig) -> Self {
    Self {
      invoker,
      executable: executable.into(),
      std_package: config.std_arg(),
      root: config.root.clone(),
      verbose: config.toolchain_verbose,
    }
  }

  /// Build a handle for the toolchain selected in `config`.
  pub fn from_config(config: &BootstrapConfig, runner: R) -> Self {
    let invoker = Invoker::new(runner, config.echo);
    Self::new(invoker, config.toolchain.executable(), config)
  }

  pub fn executable(&self) -> &Path {
    &self.executable
  }

  pub fn invoker(&self) -> &Invoker<R> {
    &self.invoker
  }

  fn command(&self, subcommand: &str) -> Invocation {
    let mut invocation = Invocation::new(&self.executable).current_dir(&self.root);
    if self.verbose {
      invocation = invocation.arg("-v");
    }
    invocation.arg(subcommand)
  }

  /// Compile `key` ahead of time.
  ///
  /// Without `redirect` the toolchain writes the artifact to its conventional
  /// location itself; with it, the toolchain's stdout becomes the artifact.
  pub async fn compile(&self, key: &ArtifactKey, redirect: Option<&ArtifactRef>) -> Result<(), ProcessError> {
    info!("compile {}", key.binary);
    let invocation = self
      .command("compile")
      .arg("--std")
      .arg(&self.std_package)
      .arg(key.package_arg())
      .arg(&key.binary);

    let capture = match redirect {
      Some(artifact) => Capture::File(&artifact.path),
      None => Capture::Inherit,
    };
    self.invoker.execute(&invocation, capture).await?;
    Ok(())
  }

  /// Execute a compiled artifact, forwarding `args`.
  pub async fn interpret(
    &self,
    artifact: &ArtifactRef,
    args: &[String],
    capture: Capture<'_>,
  ) -> Result<Output, ProcessError> {
    info!("interpret {}", banner(&artifact.stem(), args));
    let invocation = self
      .command("interpret")
      .arg(artifact.path_arg())
      .args(args.iter().cloned());
    self.invoker.execute(&invocation, capture).await
  }

  /// Resolve the standard library, compile and execute `key` in one invocation.
  pub async fn run(&self, key: &ArtifactKey, args: &[String], capture: Capture<'_>) -> Result<Output, ProcessError> {
    info!("run {}", banner(&key.binary, args));
    let invocation = self
      .command("run")
      .arg("--std")
      .arg(&self.std_package)
      .arg(key.package_arg())
      .arg(&key.binary)
      .args(args.iter().cloned());
    self.invoker.execute(&invocation, capture).await
  }

  async fn cargo(&self, crate_dir: &Path, subcommand: &str, mode: BuildMode) -> Result<(), ProcessError> {
    let mut invocation = Invocation::new("cargo")
      .args(["-q", subcommand])
      .current_dir(crate_dir);
    if mode == BuildMode::Release {
      invocation = invocation.arg("--release");
    }
    self.invoker.execute(&invocation, Capture::Inherit).await?;
    Ok(())
  }

  /// Type-check the toolchain crate.
  pub async fn check(&self, crate_dir: &Path) -> Result<(), ProcessError> {
    info!("check oftb");
    self.cargo(crate_dir, "check", BuildMode::Debug).await
  }

  /// Build the toolchain crate's documentation.
  pub async fn doc(&self, crate_dir: &Path) -> Result<(), ProcessError> {
    info!("document oftb");
    self.cargo(crate_dir, "doc", BuildMode::Debug).await
  }

  /// Build the release binary this handle points at.
  pub async fn build_release(&self, crate_dir: &Path) -> Result<(), ProcessError> {
    info!("compile oftb");
    self.cargo(crate_dir, "build", BuildMode::Release).await
  }
}

/// `target` followed by its arguments, if any.
fn banner(target: &str, args: &[String]) -> String {
  if args.is_empty() {
    target.to_string()
  } else {
    format!("{} {}", target, args.join(" "))
  }
}
