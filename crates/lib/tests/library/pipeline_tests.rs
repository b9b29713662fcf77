//! End-to-end pipeline runs against the toy toolchain.

use oftb_bootstrap_lib::pipeline::SelfTestMode;
use oftb_bootstrap_lib::{BootstrapError, Pipeline, ToolchainSource};

use super::common::{Workspace, is_call};

const CANONICAL: &str = "macro-expander/build/oftb-macro-expander.ofta";

#[tokio::test]
async fn full_run_in_stage_order() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let mut config = ws.config();
  config.aux_binaries = vec!["oftb-expand".to_string()];
  let pipeline = Pipeline::new(config, &toy);

  let report = pipeline.run().await.unwrap();

  assert_eq!(
    toy.summary(),
    [
      "run make-prelude",
      "run oftb-macro-expander",
      "interpret structure",
      "run oftb-macro-expander",
      "interpret structure",
      "compile oftb-macro-expander",
      "interpret oftb-macro-expander",
      "interpret oftb-macro-expander-2",
      "interpret oftb-macro-expander",
      "interpret structure",
      "interpret oftb-macro-expander",
      "interpret structure",
      "interpret oftb-macro-expander",
    ]
  );
  assert_eq!(report.self_tests.len(), 2);
  assert_eq!(report.self_tests[0].mode, SelfTestMode::Source);
  assert_eq!(report.self_tests[1].passed, ["no arguments", "two arguments"]);
  assert_eq!(
    report.auxiliaries,
    [std::path::PathBuf::from("macro-expander/build/oftb-expand.ofta")]
  );
  assert_eq!(ws.read("macro-expander/build/oftb-expand.ofta"), "expanded macro-expander oftb-expand\n");
}

#[tokio::test]
async fn prelude_is_regenerated() {
  let ws = Workspace::new();
  ws.write_file("ministd/src/prelude.oft", "stale");
  let toy = ws.toolchain();
  let pipeline = Pipeline::new(ws.config(), &toy);

  let prelude = pipeline.generate_prelude().await.unwrap();

  assert_eq!(prelude, std::path::PathBuf::from("ministd/src/prelude.oft"));
  assert_eq!(ws.read("ministd/src/prelude.oft"), "(def-prelude)\n");
  assert_eq!(
    toy.calls()[0].args,
    ["-v", "run", "--std", "ministd", "macro-expander", "make-prelude", "ministd"]
  );
}

#[tokio::test]
async fn commands_run_from_root() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let pipeline = Pipeline::new(ws.config(), &toy);

  pipeline.run().await.unwrap();

  assert!(toy.calls().iter().all(|call| call.cwd.as_deref() == Some(ws.root())));
  assert!(toy.calls().iter().all(|call| call.program == ws.path("bin/oftb")));
}

#[tokio::test]
async fn stage1_difference_is_tolerated() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let pipeline = Pipeline::new(ws.config(), &toy);

  let report = pipeline.run().await.unwrap();

  // The native compile writes "native ..."; self-compiles write "expanded ...".
  assert!(!report.fixpoint.stage1_matches_stage2);
  assert_eq!(report.fixpoint.stage2.digest, report.fixpoint.stage3.digest);
  assert_eq!(ws.read(CANONICAL), "expanded macro-expander oftb-macro-expander\n");
}

#[tokio::test]
async fn failing_prelude_stops_everything() {
  let ws = Workspace::new();
  let toy = ws.toolchain().failing_when(|call| is_call(call, "run", "make-prelude"));
  let pipeline = Pipeline::new(ws.config(), &toy);

  let err = pipeline.run().await.unwrap_err();

  assert!(matches!(err, BootstrapError::Process(_)));
  assert_eq!(toy.calls().len(), 1);
  assert!(!ws.path("ministd/src/prelude.oft").exists());
}

#[tokio::test]
async fn failing_native_compile_skips_later_stages() {
  let ws = Workspace::new();
  let toy = ws.toolchain().failing_when(|call| is_call(call, "compile", "oftb-macro-expander"));
  let pipeline = Pipeline::new(ws.config(), &toy);

  let err = pipeline.run().await.unwrap_err();

  assert!(matches!(err, BootstrapError::Process(_)));
  assert_eq!(toy.summary().last().unwrap(), "compile oftb-macro-expander");
  assert_eq!(toy.calls().len(), 6);
  assert!(!ws.path(CANONICAL).exists());
}

#[tokio::test]
async fn self_test_mismatch_blocks_fixpoint() {
  let ws = Workspace::new();
  let toy = ws.toolchain().with_greeting("Hello, wrld!");
  let pipeline = Pipeline::new(ws.config(), &toy);

  let err = pipeline.run().await.unwrap_err();

  match err {
    BootstrapError::SelfTestMismatch {
      case,
      expected,
      actual,
      diff,
      ..
    } => {
      assert_eq!(case, "no arguments");
      assert_eq!(expected, "Got arguments: ()\nHello, world!\nhullo\nGoodbye, world!\n");
      assert_eq!(actual, "Got arguments: ()\nHello, wrld!\nhullo\nGoodbye, world!\n");
      assert!(diff.contains("- \"Hello, world!\\n\""));
      assert!(diff.contains("+ \"Hello, wrld!\\n\""));
    }
    other => panic!("expected self-test mismatch, got {other:?}"),
  }
  assert!(!toy.calls().iter().any(|call| is_call(call, "compile", "oftb-macro-expander")));
}

#[tokio::test]
async fn non_utf8_output_is_reported_as_mismatch() {
  let ws = Workspace::new();
  let toy = ws.toolchain().with_stray_bytes(b"\xff\n");
  let pipeline = Pipeline::new(ws.config(), &toy);

  let err = pipeline.self_test(SelfTestMode::Source).await.unwrap_err();

  match err {
    BootstrapError::SelfTestMismatch { case, actual, diff, .. } => {
      assert_eq!(case, "no arguments");
      assert!(actual.ends_with("Goodbye, world!\n\u{fffd}\n"));
      assert!(diff.contains("+ \"\u{fffd}\\n\""));
    }
    other => panic!("expected self-test mismatch, got {other:?}"),
  }
}

#[tokio::test]
async fn prebuilt_self_test_needs_promoted_expander() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let pipeline = Pipeline::new(ws.config(), &toy);

  let err = pipeline.self_test(SelfTestMode::Prebuilt).await.unwrap_err();

  assert!(matches!(err, BootstrapError::Artifact(_)));
  assert!(toy.calls().is_empty());
}

#[tokio::test]
async fn prebuilt_self_test_interprets_promoted_artifact() {
  let ws = Workspace::new();
  ws.write_file(CANONICAL, "expanded macro-expander oftb-macro-expander\n");
  let toy = ws.toolchain();
  let pipeline = Pipeline::new(ws.config(), &toy);

  let report = pipeline.self_test(SelfTestMode::Prebuilt).await.unwrap();

  assert_eq!(report.passed.len(), 2);
  assert!(!toy.calls().iter().any(|call| is_call(call, "run", "")));
  assert_eq!(
    toy.calls()[0].args,
    [
      "-v",
      "interpret",
      CANONICAL,
      "ministd",
      "examples/structure",
      "structure"
    ]
  );
}

#[tokio::test]
async fn prepare_toolchain_builds_from_source() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let mut config = ws.config();
  config.toolchain = ToolchainSource::Build {
    crate_dir: ws.root().to_path_buf(),
  };
  let pipeline = Pipeline::new(config, &toy);

  let executable = pipeline.prepare_toolchain().await.unwrap();

  assert_eq!(toy.summary(), ["cargo check", "cargo doc", "cargo build"]);
  assert_eq!(executable, ws.path("target/release/oftb"));
}

#[tokio::test]
async fn prepare_toolchain_reports_missing_binary() {
  let ws = Workspace::new();
  let toy = ws.toolchain();
  let mut config = ws.config();
  config.toolchain = ToolchainSource::Prebuilt(ws.path("nowhere/oftb"));
  let pipeline = Pipeline::new(config, &toy);

  let err = pipeline.prepare_toolchain().await.unwrap_err();

  assert!(matches!(err, BootstrapError::ToolchainMissing(_)));
  assert!(toy.calls().is_empty());
}

#[tokio::test]
async fn failing_native_build_stops_before_release_build() {
  let ws = Workspace::new();
  let toy = ws.toolchain().failing_when(|call| call.args.get(1).map(String::as_str) == Some("doc"));
  let mut config = ws.config();
  config.toolchain = ToolchainSource::Build {
    crate_dir: ws.root().to_path_buf(),
  };
  let pipeline = Pipeline::new(config, &toy);

  let err = pipeline.prepare_toolchain().await.unwrap_err();

  assert!(matches!(err, BootstrapError::Process(_)));
  assert_eq!(toy.summary(), ["cargo check", "cargo doc"]);
}
