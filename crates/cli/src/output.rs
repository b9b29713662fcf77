//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable sizes and durations, and the text
//! rendering of pipeline reports shared by the subcommands.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use oftb_bootstrap_lib::package::ArchiveReport;
use oftb_bootstrap_lib::pipeline::{ArtifactDigest, FixpointReport, SelfTestMode, SelfTestReport};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

/// Size with a binary unit suffix, one decimal above bytes.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", value, UNITS[unit])
}

/// Compact wall-clock duration: `340ms`, `12.40s` or `3m 7s`.
pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.subsec_millis()),
    secs @ 1..60 => format!("{}.{:02}s", secs, duration.subsec_millis() / 10),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}

pub fn print_success(message: &str) {
  let symbol = symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green());
  println!("{} {}", symbol, message);
}

pub fn print_info(message: &str) {
  let symbol = symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue());
  println!("{} {}", symbol, message);
}

/// Failures go to stderr, colored as a whole.
pub fn print_error(message: &str) {
  let symbol = symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red());
  eprintln!("{} {}", symbol, message.if_supports_color(Stream::Stderr, |s| s.red()));
}

pub fn print_warning(message: &str) {
  let symbol = symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow());
  eprintln!("{} {}", symbol, message.if_supports_color(Stream::Stderr, |s| s.yellow()));
}

/// Indented `label: value` line under a status line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
  println!("{}", json);
  Ok(())
}

fn describe_artifact(artifact: &ArtifactDigest) -> String {
  format!("{} ({})", artifact.path.display(), artifact.digest.short())
}

pub fn print_fixpoint(report: &FixpointReport) {
  print_stat("Stage 1", &describe_artifact(&report.stage1));
  print_stat("Stage 2", &describe_artifact(&report.stage2));
  print_stat("Stage 3", &describe_artifact(&report.stage3));
  let relation = if report.stage1_matches_stage2 {
    "identical"
  } else {
    "different (allowed)"
  };
  print_stat("Stage 1 vs 2", relation);
  print_stat("Promoted", &report.promoted.display().to_string());
}

pub fn self_test_label(mode: SelfTestMode) -> &'static str {
  match mode {
    SelfTestMode::Source => "Self-test (source)",
    SelfTestMode::Prebuilt => "Self-test (prebuilt)",
  }
}

pub fn print_self_test(report: &SelfTestReport) {
  print_stat(
    self_test_label(report.mode),
    &format!("{} passed ({})", report.passed.len(), report.passed.join(", ")),
  );
}

pub fn print_archive(report: &ArchiveReport) {
  print_stat(
    "Archive",
    &format!(
      "{} ({} entries, {})",
      report.path.display(),
      report.entries,
      format_bytes(report.bytes)
    ),
  );
}
