//! Implementation of the `oftb-boot bootstrap` command.
//!
//! Runs the complete bootstrap: native toolchain build (unless a pre-built or
//! system toolchain was selected), prelude generation, both self-tests, the
//! fixpoint check with promotion, auxiliary compilation and packaging.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use oftb_bootstrap_lib::package::{ArchiveReport, ArchiveSpec, make_archive};
use oftb_bootstrap_lib::process::SystemRunner;
use oftb_bootstrap_lib::{BootstrapConfig, BootstrapError, Pipeline, PipelineReport};

use super::runtime;
use crate::output::{
  OutputFormat, format_duration, print_archive, print_fixpoint, print_info, print_json, print_self_test, print_stat,
  print_success,
};

#[derive(Serialize)]
struct BootstrapSummary<'a> {
  pipeline: &'a PipelineReport,
  archive: Option<&'a ArchiveReport>,
}

/// Execute the bootstrap command.
///
/// `archive` is `None` to skip packaging, `Some(None)` for the default
/// `<root>/oftb.tar.gz`, or `Some(Some(path))` for an explicit location. The
/// archive is only written after every pipeline stage has succeeded.
pub fn cmd_bootstrap(config: BootstrapConfig, archive: Option<Option<PathBuf>>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let rt = runtime()?;
  let pipeline = Pipeline::new(config, SystemRunner);

  let (executable, report) = rt
    .block_on(async {
      let executable = pipeline.prepare_toolchain().await?;
      let report = pipeline.run().await?;
      Ok::<_, BootstrapError>((executable, report))
    })
    .context("Bootstrap failed")?;

  let archive = match archive {
    Some(path) => {
      let spec = ArchiveSpec::from_config(pipeline.config(), executable, path);
      Some(make_archive(&spec).context("Packaging failed")?)
    }
    None => None,
  };

  if output.is_json() {
    return print_json(&BootstrapSummary {
      pipeline: &report,
      archive: archive.as_ref(),
    });
  }

  println!();
  print_success("Bootstrap complete!");
  print_stat("Toolchain", &report.toolchain.display().to_string());
  print_stat("Prelude", &report.prelude.display().to_string());
  for self_test in &report.self_tests {
    print_self_test(self_test);
  }
  print_fixpoint(&report.fixpoint);
  for auxiliary in &report.auxiliaries {
    print_stat("Auxiliary", &auxiliary.display().to_string());
  }
  match &archive {
    Some(archive) => print_archive(archive),
    None => print_info("Archive skipped"),
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
