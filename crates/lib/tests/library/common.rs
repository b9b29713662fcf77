//! Shared test helpers for library integration tests.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use oftb_bootstrap_lib::process::{Capture, Invocation, Output, ProcessError, Runner};
use oftb_bootstrap_lib::util::fs::write_atomic;
use oftb_bootstrap_lib::{BootstrapConfig, ToolchainSource};
use tempfile::TempDir;

type Predicate = Box<dyn Fn(&Invocation) -> bool>;

/// A deterministic toy compiler standing in for oftb.
///
/// `compile` writes `native <package> <binary>` to the conventional artifact
/// path. Running the macro expander prints `expanded <package> <binary>`, which
/// is therefore what every self-compiled artifact contains. `interpret` reads
/// the artifact to decide which program it is.
pub struct ToyToolchain {
  root: PathBuf,
  calls: RefCell<Vec<Invocation>>,
  fail_when: Option<Predicate>,
  nondeterministic: bool,
  greeting: String,
  stray: Vec<u8>,
  silent_compile: bool,
  generation: Cell<u32>,
}

impl ToyToolchain {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      calls: RefCell::new(Vec::new()),
      fail_when: None,
      nondeterministic: false,
      greeting: "Hello, world!".to_string(),
      stray: Vec::new(),
      silent_compile: false,
      generation: Cell::new(0),
    }
  }

  /// Exit with status 1 for every invocation matching `predicate`.
  pub fn failing_when(mut self, predicate: impl Fn(&Invocation) -> bool + 'static) -> Self {
    self.fail_when = Some(Box::new(predicate));
    self
  }

  /// Make the expander stamp a fresh generation number into every output.
  pub fn nondeterministic(mut self) -> Self {
    self.nondeterministic = true;
    self
  }

  /// Change the greeting the self-test program prints.
  pub fn with_greeting(mut self, greeting: &str) -> Self {
    self.greeting = greeting.to_string();
    self
  }

  /// Append raw bytes to everything the self-test program prints.
  pub fn with_stray_bytes(mut self, bytes: &[u8]) -> Self {
    self.stray = bytes.to_vec();
    self
  }

  /// Make `compile` exit successfully without writing an artifact.
  pub fn silent_compile(mut self) -> Self {
    self.silent_compile = true;
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.borrow().clone()
  }

  /// One short line per invocation, e.g. `interpret oftb-macro-expander-2`.
  pub fn summary(&self) -> Vec<String> {
    self.calls.borrow().iter().map(describe).collect()
  }

  fn respond(&self, invocation: &Invocation) -> Result<Vec<u8>, String> {
    if invocation.program.ends_with("cargo") {
      if invocation.args.get(1).map(String::as_str) == Some("build") {
        let binary = self.root.join("target/release/oftb");
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(binary, "native toolchain").unwrap();
      }
      return Ok(Vec::new());
    }

    let args = toolchain_args(invocation);
    match args.first().map(String::as_str) {
      Some("compile") if self.silent_compile => Ok(Vec::new()),
      Some("compile") => {
        let (package, binary) = (&args[3], &args[4]);
        let path = self.root.join(package).join("build").join(format!("{}.ofta", binary));
        write_atomic(&path, format!("native {} {}\n", package, binary).as_bytes()).unwrap();
        Ok(Vec::new())
      }
      Some("run") => self.program(&args[4], &args[5..]),
      Some("interpret") => {
        let artifact = fs::read_to_string(self.root.join(&args[1]))
          .map_err(|e| format!("cannot load {}: {}", args[1], e))?;
        let binary = artifact
          .split_whitespace()
          .nth(2)
          .ok_or_else(|| format!("malformed artifact {}", args[1]))?
          .to_string();
        self.program(&binary, &args[2..])
      }
      other => Err(format!("unknown subcommand {:?}", other)),
    }
  }

  fn program(&self, binary: &str, args: &[String]) -> Result<Vec<u8>, String> {
    match binary {
      "make-prelude" => Ok(b"(def-prelude)\n".to_vec()),
      "structure" => {
        let list = if args.is_empty() {
          "()".to_string()
        } else {
          let quoted: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
          format!("({})", quoted.join(" "))
        };
        let mut out = format!("Got arguments: {}\n{}\nhullo\nGoodbye, world!\n", list, self.greeting);
        if !args.is_empty() {
          out.push_str(&format!("{}\n", list));
        }
        let mut out = out.into_bytes();
        out.extend_from_slice(&self.stray);
        Ok(out)
      }
      _ => {
        let [_, package, target] = args else {
          return Err(format!("{} expects <std> <package> <binary>", binary));
        };
        let mut out = format!("expanded {} {}", package, target);
        if self.nondeterministic {
          self.generation.set(self.generation.get() + 1);
          out.push_str(&format!(" #{}", self.generation.get()));
        }
        out.push('\n');
        Ok(out.into_bytes())
      }
    }
  }
}

impl Runner for ToyToolchain {
  async fn run(&self, invocation: &Invocation, capture: Capture<'_>) -> Result<Output, ProcessError> {
    self.calls.borrow_mut().push(invocation.clone());

    let failed = || ProcessError::Failed {
      cmd: invocation.command_line(),
      code: Some(1),
    };
    if self.fail_when.as_ref().is_some_and(|f| f(invocation)) {
      return Err(failed());
    }
    let stdout = self.respond(invocation).map_err(|_| failed())?;

    Ok(match capture {
      Capture::Inherit => Output::Inherited,
      Capture::Text => Output::Text(String::from_utf8(stdout).unwrap()),
      Capture::Bytes => Output::Bytes(stdout),
      Capture::File(dest) => {
        write_atomic(dest, &stdout).unwrap();
        Output::File(dest.to_path_buf())
      }
    })
  }
}

fn toolchain_args(invocation: &Invocation) -> &[String] {
  match invocation.args.first().map(String::as_str) {
    Some("-v") => &invocation.args[1..],
    _ => &invocation.args,
  }
}

fn describe(invocation: &Invocation) -> String {
  if invocation.program.ends_with("cargo") {
    return format!("cargo {}", invocation.args[1]);
  }
  let args = toolchain_args(invocation);
  match args[0].as_str() {
    "interpret" => {
      let stem = Path::new(&args[1]).file_stem().unwrap().to_string_lossy().into_owned();
      format!("interpret {}", stem)
    }
    sub => format!("{} {}", sub, args[4]),
  }
}

/// True for toolchain invocations of `subcommand` whose target mentions `needle`.
pub fn is_call(invocation: &Invocation, subcommand: &str, needle: &str) -> bool {
  let args = toolchain_args(invocation);
  args.first().map(String::as_str) == Some(subcommand) && args.iter().skip(1).any(|a| a.contains(needle))
}

/// A temporary oftb source tree with a pre-built toolchain binary.
pub struct Workspace {
  pub temp: TempDir,
}

impl Workspace {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let ws = Self { temp };
    ws.write_file("macro-expander/src/main.oft", "(def main () (expand))\n");
    ws.write_file("macro-expander/src/make-prelude.oft", "(def main () (prelude))\n");
    ws.write_file("ministd/src/lib.oft", "(import prelude)\n");
    ws.write_file("examples/structure/src/structure.oft", "(def main (args) (hello))\n");
    ws.write_file("bin/oftb", "toolchain");
    ws
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  pub fn write_file(&self, relative: &str, content: &str) {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn read(&self, relative: &str) -> String {
    fs::read_to_string(self.path(relative)).unwrap_or_else(|e| panic!("Failed to read {}: {}", relative, e))
  }

  /// Configuration using the pre-built `bin/oftb`.
  pub fn config(&self) -> BootstrapConfig {
    let mut config = BootstrapConfig::new(self.root());
    config.toolchain = ToolchainSource::Prebuilt(self.path("bin/oftb"));
    config
  }

  pub fn toolchain(&self) -> ToyToolchain {
    ToyToolchain::new(self.root())
  }
}
