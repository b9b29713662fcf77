//! Implementation of the `oftb-boot package` command.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use oftb_bootstrap_lib::BootstrapConfig;
use oftb_bootstrap_lib::package::{ArchiveSpec, make_archive};

use crate::output::{OutputFormat, print_archive, print_json, print_stat, print_success};

/// Package the selected toolchain binary with the macro-expander and standard
/// library sources. Never builds anything.
pub fn cmd_package(config: BootstrapConfig, archive: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let executable = config
    .toolchain
    .locate()
    .ok_or_else(|| anyhow!("Toolchain binary not found: {}", config.toolchain.executable().display()))?;

  let spec = ArchiveSpec::from_config(&config, executable, archive);
  let report = make_archive(&spec).context("Packaging failed")?;

  if output.is_json() {
    return print_json(&report);
  }

  println!();
  print_success("Archive written");
  print_archive(&report);
  print_stat("SHA-256", report.digest.short());

  Ok(())
}
