//! Types for pipeline stages.
//!
//! This module defines the error type shared by all stages, the stage
//! identifiers used in logs, and the reports each stage produces.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::process::ProcessError;
use crate::util::hash::ContentHash;

/// Errors that abort a bootstrap run.
///
/// Every variant is fatal: the pipeline stops at the first one and a re-run
/// starts over from the beginning.
#[derive(Debug, Error)]
pub enum BootstrapError {
  /// An external command failed.
  #[error(transparent)]
  Process(#[from] ProcessError),

  /// An artifact is missing or could not be read, promoted or removed.
  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  /// Interpreted output differs from the expected text.
  #[error(
    "self-test `{case}` of {program} failed\n  expected: {expected:?}\n  actual:   {actual:?}\n{diff}"
  )]
  SelfTestMismatch {
    case: String,
    program: String,
    expected: String,
    actual: String,
    diff: String,
  },

  /// The second and third self-compilations differ.
  #[error(
    "{binary} is not idempotent: {second} ({second_digest}) differs from {third} ({third_digest})"
  )]
  IdempotenceViolation {
    binary: String,
    second: PathBuf,
    third: PathBuf,
    second_digest: ContentHash,
    third_digest: ContentHash,
  },

  /// The fixpoint stage needs a regenerated prelude.
  #[error("prelude {0} has not been generated; run the full bootstrap first")]
  MissingPrelude(PathBuf),

  /// The toolchain binary is not where it should be.
  #[error("toolchain binary not found at {0}")]
  ToolchainMissing(PathBuf),
}

/// Outcome of one stage: its product, or the reason the run is over.
pub type StageOutcome<T> = Result<T, BootstrapError>;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
  NativeBuild,
  PreludeGeneration,
  SelfTestSource,
  Fixpoint,
  SelfTestPrebuilt,
  Auxiliary,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::NativeBuild => "native build",
      Stage::PreludeGeneration => "prelude generation",
      Stage::SelfTestSource => "macro-expander self-test (source)",
      Stage::Fixpoint => "fixpoint verification",
      Stage::SelfTestPrebuilt => "macro-expander self-test (prebuilt)",
      Stage::Auxiliary => "auxiliary compilation",
    };
    f.write_str(name)
  }
}

/// How the self-test drives the macro expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelfTestMode {
  /// `run` the expander from source.
  Source,
  /// `interpret` the promoted expander artifact.
  Prebuilt,
}

impl SelfTestMode {
  pub fn stage(self) -> Stage {
    match self {
      SelfTestMode::Source => Stage::SelfTestSource,
      SelfTestMode::Prebuilt => Stage::SelfTestPrebuilt,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
  pub mode: SelfTestMode,
  /// Names of the cases that passed.
  pub passed: Vec<String>,
}

/// An artifact path with its digest at the time it was checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDigest {
  pub path: PathBuf,
  pub digest: ContentHash,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixpointReport {
  /// Compiled by the native toolchain.
  pub stage1: ArtifactDigest,
  /// Compiled by stage 1.
  pub stage2: ArtifactDigest,
  /// Compiled by stage 2; identical to stage 2.
  pub stage3: ArtifactDigest,
  /// Informational only; the native and self-hosted compilers may differ.
  pub stage1_matches_stage2: bool,
  /// Canonical path now holding the stage 3 bytes.
  pub promoted: PathBuf,
}

/// Summary of a complete bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub toolchain: PathBuf,
  pub prelude: PathBuf,
  pub self_tests: Vec<SelfTestReport>,
  pub fixpoint: FixpointReport,
  pub auxiliaries: Vec<PathBuf>,
}
