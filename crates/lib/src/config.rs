//! Pipeline configuration.
//!
//! A [`BootstrapConfig`] describes one pipeline run: where the source tree
//! lives, which toolchain binary drives it, and the names of the packages and
//! entry points involved. [`BootstrapConfig::new`] gives the standard oftb
//! layout; callers override individual fields.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::artifact::ArtifactKey;
use crate::consts::{
  EXPANDER_BINARY, EXPANDER_PACKAGE, PRELUDE_GENERATOR, PRELUDE_PATH, ROOT_ENV, SELF_TEST_BINARY,
  SELF_TEST_PACKAGE, STD_PACKAGE, TOOLCHAIN_BIN_NAME, TOOLCHAIN_ENV,
};

/// Where the native toolchain binary comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainSource {
  /// Build the crate at `crate_dir` with cargo and use its release binary.
  Build { crate_dir: PathBuf },
  /// Use an existing binary.
  Prebuilt(PathBuf),
  /// Use `oftb` from `PATH`.
  System,
}

impl ToolchainSource {
  /// Pick a source from the command-line switches, in priority order:
  /// system toolchain, explicit path, `OFTB_BOOTSTRAP_TOOLCHAIN`, the existing
  /// release build when `skip_build` is set, and finally a fresh build.
  pub fn select(root: &Path, use_system: bool, explicit: Option<PathBuf>, skip_build: bool) -> Self {
    if use_system {
      return ToolchainSource::System;
    }
    if let Some(path) = explicit.or_else(toolchain_from_env) {
      return ToolchainSource::Prebuilt(path);
    }
    if skip_build {
      return ToolchainSource::Prebuilt(release_executable(root));
    }
    ToolchainSource::Build {
      crate_dir: root.to_path_buf(),
    }
  }

  /// The program to spawn for toolchain invocations.
  pub fn executable(&self) -> PathBuf {
    match self {
      ToolchainSource::Build { crate_dir } => release_executable(crate_dir),
      ToolchainSource::Prebuilt(path) => path.clone(),
      ToolchainSource::System => PathBuf::from(TOOLCHAIN_BIN_NAME),
    }
  }

  pub fn needs_build(&self) -> bool {
    matches!(self, ToolchainSource::Build { .. })
  }

  /// The executable as a file on disk, searching `PATH` for the system toolchain.
  pub fn locate(&self) -> Option<PathBuf> {
    match self {
      ToolchainSource::System => find_on_path(TOOLCHAIN_BIN_NAME),
      other => {
        let path = other.executable();
        path.is_file().then_some(path)
      }
    }
  }
}

/// Path of the release binary cargo produces for the toolchain crate.
pub fn release_executable(crate_dir: &Path) -> PathBuf {
  crate_dir
    .join("target")
    .join("release")
    .join(format!("{}{}", TOOLCHAIN_BIN_NAME, env::consts::EXE_SUFFIX))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
  let file_name = format!("{}{}", name, env::consts::EXE_SUFFIX);
  let path = env::var_os("PATH")?;
  env::split_paths(&path)
    .map(|dir| dir.join(&file_name))
    .find(|candidate| candidate.is_file())
}

/// Returns the toolchain path from `OFTB_BOOTSTRAP_TOOLCHAIN`, if set and non-empty.
pub fn toolchain_from_env() -> Option<PathBuf> {
  env::var_os(TOOLCHAIN_ENV)
    .filter(|value| !value.is_empty())
    .map(PathBuf::from)
}

/// Returns the pipeline root: `OFTB_BOOTSTRAP_ROOT` if set, else the current directory.
pub fn default_root() -> io::Result<PathBuf> {
  match env::var_os(ROOT_ENV).filter(|value| !value.is_empty()) {
    Some(root) => Ok(PathBuf::from(root)),
    None => env::current_dir(),
  }
}

/// Configuration for one bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapConfig {
  /// Directory all package paths are relative to; toolchain commands run here.
  pub root: PathBuf,
  pub toolchain: ToolchainSource,
  /// Standard library package passed as `--std`.
  pub std_package: PathBuf,
  /// The in-language macro expander.
  pub expander: ArtifactKey,
  /// Entry point of the expander package that prints the prelude.
  pub prelude_generator: String,
  /// Prelude source file, relative to `root`.
  pub prelude_path: PathBuf,
  /// Program expanded and run by the self-test.
  pub self_test: ArtifactKey,
  /// Additional expander-package entry points compiled after promotion.
  pub aux_binaries: Vec<String>,
  /// Echo every command line to stderr before running it.
  pub echo: bool,
  /// Pass `-v` to the toolchain.
  pub toolchain_verbose: bool,
}

impl BootstrapConfig {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      toolchain: ToolchainSource::Build {
        crate_dir: root.clone(),
      },
      root,
      std_package: PathBuf::from(STD_PACKAGE),
      expander: ArtifactKey::new(EXPANDER_PACKAGE, EXPANDER_BINARY),
      prelude_generator: PRELUDE_GENERATOR.to_string(),
      prelude_path: PathBuf::from(PRELUDE_PATH),
      self_test: ArtifactKey::new(SELF_TEST_PACKAGE, SELF_TEST_BINARY),
      aux_binaries: Vec::new(),
      echo: false,
      toolchain_verbose: true,
    }
  }

  /// The `--std` argument.
  pub fn std_arg(&self) -> String {
    self.std_package.to_string_lossy().into_owned()
  }

  /// Absolute path of the generated prelude.
  pub fn prelude_file(&self) -> PathBuf {
    self.root.join(&self.prelude_path)
  }

  /// Source trees shipped next to the toolchain binary.
  pub fn source_trees(&self) -> Vec<PathBuf> {
    vec![self.expander.package.clone(), self.std_package.clone()]
  }
}
