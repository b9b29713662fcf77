//! Macro-expander self-test.
//!
//! Expands and compiles a known program through the macro expander, then
//! interprets it and compares stdout against fixed text. The same cases run
//! twice per bootstrap: once with the expander run from source before the
//! fixpoint stage, once with the promoted expander artifact after it.

use tracing::{debug, info};

use super::Pipeline;
use super::types::{BootstrapError, SelfTestMode, SelfTestReport, StageOutcome};
use crate::artifact::ArtifactRef;
use crate::process::{Capture, Runner};

/// One invocation of the self-test program and the output it must produce.
#[derive(Debug, Clone, Copy)]
pub struct SelfTestCase {
  pub name: &'static str,
  pub args: &'static [&'static str],
  pub expected: &'static str,
}

pub const SELF_TEST_CASES: [SelfTestCase; 2] = [
  SelfTestCase {
    name: "no arguments",
    args: &[],
    expected: "Got arguments: ()\nHello, world!\nhullo\nGoodbye, world!\n",
  },
  SelfTestCase {
    name: "two arguments",
    args: &["foo", "bar"],
    expected: "Got arguments: (\"foo\" \"bar\")\nHello, world!\nhullo\nGoodbye, world!\n(\"foo\" \"bar\")\n",
  },
];

impl<R: Runner> Pipeline<R> {
  /// Run every self-test case with the expander driven according to `mode`.
  pub async fn self_test(&self, mode: SelfTestMode) -> StageOutcome<SelfTestReport> {
    info!(stage = %mode.stage(), "stage started");
    let mut passed = Vec::with_capacity(SELF_TEST_CASES.len());

    for case in &SELF_TEST_CASES {
      let program = self.expand_test_program(mode).await?;
      let args: Vec<String> = case.args.iter().map(|arg| arg.to_string()).collect();
      let actual = self
        .toolchain
        .interpret(&program, &args, Capture::Bytes)
        .await?
        .into_bytes()
        .unwrap_or_default();
      check_output(case, &program, &actual)?;

      debug!(case = case.name, "self-test passed");
      passed.push(case.name.to_string());
    }

    Ok(SelfTestReport { mode, passed })
  }

  /// Macro-expand and compile the self-test program into its canonical artifact.
  async fn expand_test_program(&self, mode: SelfTestMode) -> StageOutcome<ArtifactRef> {
    let program = self.store.artifact(&self.config.self_test);
    let args = vec![
      self.config.std_arg(),
      self.config.self_test.package_arg(),
      self.config.self_test.binary.clone(),
    ];
    let capture = Capture::File(&program.path);

    match mode {
      SelfTestMode::Source => {
        self.toolchain.run(&self.config.expander, &args, capture).await?;
      }
      SelfTestMode::Prebuilt => {
        let expander = self.store.artifact(&self.config.expander);
        self.store.require(&expander)?;
        self.toolchain.interpret(&expander, &args, capture).await?;
      }
    }

    self.store.require(&program)?;
    Ok(program)
  }
}

/// Compare raw stdout with the expected text byte for byte.
///
/// Output that is not valid UTF-8 is still reported as a mismatch, with the
/// invalid sequences shown as replacement characters.
fn check_output(case: &SelfTestCase, program: &ArtifactRef, actual: &[u8]) -> Result<(), BootstrapError> {
  if actual == case.expected.as_bytes() {
    return Ok(());
  }

  let actual = String::from_utf8_lossy(actual);
  Err(BootstrapError::SelfTestMismatch {
    case: case.name.to_string(),
    program: program.key.binary.clone(),
    expected: case.expected.to_string(),
    actual: actual.to_string(),
    diff: render_diff(case.expected, &actual),
  })
}

/// Line-by-line diff of expected and actual output.
///
/// Lines keep their terminators and are debug-quoted so that whitespace and
/// missing trailing newlines are visible.
pub fn render_diff(expected: &str, actual: &str) -> String {
  let expected: Vec<&str> = expected.split_inclusive('\n').collect();
  let actual: Vec<&str> = actual.split_inclusive('\n').collect();
  let mut out = Vec::new();

  for i in 0..expected.len().max(actual.len()) {
    match (expected.get(i), actual.get(i)) {
      (Some(e), Some(a)) if e == a => out.push(format!("  {:?}", e)),
      (e, a) => {
        if let Some(e) = e {
          out.push(format!("- {:?}", e));
        }
        if let Some(a) = a {
          out.push(format!("+ {:?}", a));
        }
      }
    }
  }

  out.join("\n")
}
