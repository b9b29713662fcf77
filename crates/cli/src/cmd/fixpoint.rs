//! Implementation of the `oftb-boot fixpoint` command.
//!
//! Runs only the triple-compile check and promotion. The prelude must already
//! have been generated by a previous full bootstrap.

use anyhow::{Context, Result};

use oftb_bootstrap_lib::process::SystemRunner;
use oftb_bootstrap_lib::{BootstrapConfig, Pipeline};

use super::runtime;
use crate::output::{OutputFormat, print_fixpoint, print_json, print_success, print_warning};

pub fn cmd_fixpoint(config: BootstrapConfig, output: OutputFormat) -> Result<()> {
  let rt = runtime()?;
  let pipeline = Pipeline::new(config, SystemRunner);

  let report = rt
    .block_on(async {
      pipeline.prepare_toolchain().await?;
      pipeline.verify_fixpoint().await
    })
    .context("Fixpoint verification failed")?;

  if output.is_json() {
    return print_json(&report);
  }

  println!();
  print_success("Macro expander is idempotent");
  print_fixpoint(&report);
  if !report.stage1_matches_stage2 {
    print_warning("Native and self-hosted builds differ; only stages 2 and 3 must match");
  }

  Ok(())
}
