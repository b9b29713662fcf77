//! The bootstrap pipeline.
//!
//! Stages run strictly in order and communicate only through files:
//!
//! 1. Native build of the toolchain (when the configuration asks for it)
//! 2. Prelude generation
//! 3. Macro-expander self-test, expander run from source
//! 4. Fixpoint verification and promotion
//! 5. Macro-expander self-test, promoted expander artifact
//! 6. Auxiliary compilation
//!
//! The first failing stage ends the run.

mod fixpoint;
mod selftest;
pub mod types;

use std::path::PathBuf;

use tracing::info;

use crate::artifact::{ArtifactKey, ArtifactStore};
use crate::config::{BootstrapConfig, ToolchainSource};
use crate::process::{Capture, Runner, SystemRunner};
use crate::toolchain::Toolchain;

pub use selftest::{SELF_TEST_CASES, SelfTestCase, render_diff};
pub use types::{
  ArtifactDigest, BootstrapError, FixpointReport, PipelineReport, SelfTestMode, SelfTestReport, Stage, StageOutcome,
};

/// Drives the bootstrap stages for one configuration.
pub struct Pipeline<R = SystemRunner> {
  config: BootstrapConfig,
  toolchain: Toolchain<R>,
  store: ArtifactStore,
}

impl<R: Runner> Pipeline<R> {
  pub fn new(config: BootstrapConfig, runner: R) -> Self {
    let toolchain = Toolchain::from_config(&config, runner);
    let store = ArtifactStore::new(&config.root);
    Self {
      config,
      toolchain,
      store,
    }
  }

  pub fn config(&self) -> &BootstrapConfig {
    &self.config
  }

  pub fn toolchain(&self) -> &Toolchain<R> {
    &self.toolchain
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  /// Make sure the toolchain binary exists, building it first if configured to.
  pub async fn prepare_toolchain(&self) -> StageOutcome<PathBuf> {
    if let ToolchainSource::Build { crate_dir } = &self.config.toolchain {
      info!(stage = %Stage::NativeBuild, "stage started");
      self.toolchain.check(crate_dir).await?;
      self.toolchain.doc(crate_dir).await?;
      self.toolchain.build_release(crate_dir).await?;
    }

    self
      .config
      .toolchain
      .locate()
      .ok_or_else(|| BootstrapError::ToolchainMissing(self.toolchain.executable().to_path_buf()))
  }

  /// Regenerate the standard library's prelude.
  ///
  /// Must complete before the fixpoint stage: the expander compiles against
  /// the standard library, and a stale prelude is not accepted as input.
  pub async fn generate_prelude(&self) -> StageOutcome<PathBuf> {
    info!(stage = %Stage::PreludeGeneration, "stage started");
    let generator = ArtifactKey::new(&self.config.expander.package, &self.config.prelude_generator);
    let prelude = self.config.prelude_file();

    self
      .toolchain
      .run(&generator, &[self.config.std_arg()], Capture::File(&prelude))
      .await?;

    Ok(self.config.prelude_path.clone())
  }

  /// Compile each auxiliary entry point with the promoted expander.
  pub async fn compile_auxiliaries(&self) -> StageOutcome<Vec<PathBuf>> {
    info!(stage = %Stage::Auxiliary, count = self.config.aux_binaries.len(), "stage started");
    let expander = self.store.artifact(&self.config.expander);
    self.store.require(&expander)?;

    let mut compiled = Vec::with_capacity(self.config.aux_binaries.len());
    for binary in &self.config.aux_binaries {
      let key = ArtifactKey::new(&self.config.expander.package, binary);
      let output = self.store.artifact(&key);
      let args = vec![self.config.std_arg(), key.package_arg(), key.binary.clone()];

      self
        .toolchain
        .interpret(&expander, &args, Capture::File(&output.path))
        .await?;
      self.store.require(&output)?;
      compiled.push(output.relative);
    }

    Ok(compiled)
  }

  /// Run every stage after the native build, stopping at the first failure.
  pub async fn run(&self) -> StageOutcome<PipelineReport> {
    let prelude = self.generate_prelude().await?;
    let source = self.self_test(SelfTestMode::Source).await?;
    let fixpoint = self.verify_fixpoint().await?;
    let prebuilt = self.self_test(SelfTestMode::Prebuilt).await?;
    let auxiliaries = self.compile_auxiliaries().await?;

    info!("bootstrap complete");
    Ok(PipelineReport {
      toolchain: self.toolchain.executable().to_path_buf(),
      prelude,
      self_tests: vec![source, prebuilt],
      fixpoint,
      auxiliaries,
    })
  }
}
