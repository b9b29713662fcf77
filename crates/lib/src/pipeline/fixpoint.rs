//! Triple-compile fixpoint verification.
//!
//! ```text
//! oftb                   --compile-->  oftb-macro-expander.ofta    (stage 1)
//! stage 1 (interpreted)  --compile-->  oftb-macro-expander-2.ofta  (stage 2)
//! stage 2 (interpreted)  --compile-->  oftb-macro-expander-3.ofta  (stage 3)
//! ```
//!
//! Stages 1 and 2 come from different compilers (native and self-hosted) and
//! may legitimately differ byte-wise. Stages 2 and 3 are the same program
//! compiling the same source, so a deterministic expander produces identical
//! bytes. Only then is stage 3 promoted over the canonical name.

use tracing::{info, warn};

use super::Pipeline;
use super::types::{ArtifactDigest, BootstrapError, FixpointReport, Stage, StageOutcome};
use crate::artifact::{ArtifactRef, identical};
use crate::process::{Capture, Runner};

impl<R: Runner> Pipeline<R> {
  /// Compile the expander three times, check stages 2 and 3 match, and promote.
  ///
  /// Requires the prelude to have been generated. On an idempotence violation
  /// the `-2`/`-3` artifacts are left in place for inspection and nothing is
  /// promoted.
  pub async fn verify_fixpoint(&self) -> StageOutcome<FixpointReport> {
    info!(stage = %Stage::Fixpoint, "stage started");
    self.require_prelude()?;

    let key = &self.config.expander;
    let stage1 = self.store.artifact(key);
    let stage2 = self.store.variant(key, 2);
    let stage3 = self.store.variant(key, 3);

    // Compile 1 writes the canonical name; a leftover from an earlier run must not satisfy it.
    self.store.discard(&stage1)?;
    self.toolchain.compile(key, None).await?;
    self.store.require(&stage1)?;

    self.self_compile(&stage1, &stage2).await?;
    self.self_compile(&stage2, &stage3).await?;

    let digest1 = stage1.digest()?;
    let digest2 = stage2.digest()?;
    let digest3 = stage3.digest()?;

    if !identical(&stage2, &stage3)? {
      return Err(BootstrapError::IdempotenceViolation {
        binary: key.binary.clone(),
        second: stage2.relative.clone(),
        third: stage3.relative.clone(),
        second_digest: digest2,
        third_digest: digest3,
      });
    }

    let stage1_matches_stage2 = digest1 == digest2;
    if !stage1_matches_stage2 {
      warn!(
        stage1 = digest1.short(),
        stage2 = digest2.short(),
        "stage 1 differs from stage 2; expected when native and self-hosted code generation differ"
      );
    }

    self.store.promote(&stage3, &stage1)?;
    self.store.remove(&stage2)?;
    self.store.remove(&stage3)?;
    info!(artifact = %stage1.relative.display(), digest = digest3.short(), "promoted stage 3");

    Ok(FixpointReport {
      stage1: ArtifactDigest {
        path: stage1.relative.clone(),
        digest: digest1,
      },
      stage2: ArtifactDigest {
        path: stage2.relative,
        digest: digest2,
      },
      stage3: ArtifactDigest {
        path: stage3.relative,
        digest: digest3,
      },
      stage1_matches_stage2,
      promoted: stage1.relative,
    })
  }

  /// Have `compiler` compile the expander's own source into `output`.
  async fn self_compile(&self, compiler: &ArtifactRef, output: &ArtifactRef) -> StageOutcome<()> {
    let key = &self.config.expander;
    let args = vec![self.config.std_arg(), key.package_arg(), key.binary.clone()];

    self
      .toolchain
      .interpret(compiler, &args, Capture::File(&output.path))
      .await?;
    self.store.require(output)?;
    Ok(())
  }

  fn require_prelude(&self) -> StageOutcome<()> {
    let prelude = self.config.prelude_file();
    if prelude.is_file() {
      Ok(())
    } else {
      Err(BootstrapError::MissingPrelude(self.config.prelude_path.clone()))
    }
  }
}
