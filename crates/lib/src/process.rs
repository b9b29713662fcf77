//! External process invocation.
//!
//! Every toolchain operation ends up here as an [`Invocation`]: a program, its
//! arguments and an optional working directory. The [`Invoker`] runs it to
//! completion through a [`Runner`], echoing the command line when asked to,
//! and treats any nonzero exit as fatal.
//!
//! Standard output can be left attached to the terminal, captured as text or
//! raw bytes, or redirected into a file. File redirects stream into a
//! temporary sibling of the destination which is renamed into place only after
//! the command exits successfully.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::util::fs::{persist, staging_file};

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  /// The command line as a user would type it.
  ///
  /// Arguments that are empty or contain whitespace or quotes are wrapped in
  /// single quotes.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.to_string_lossy().into_owned())
      .chain(self.args.iter().cloned())
      .map(|word| quote(&word))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.command_line())
  }
}

fn quote(word: &str) -> String {
  let plain = !word.is_empty() && !word.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"');
  if plain {
    word.to_string()
  } else {
    format!("'{}'", word.replace('\'', r"'\''"))
  }
}

/// What to do with a command's standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture<'a> {
  /// Leave stdout attached to ours.
  Inherit,
  /// Collect stdout and return it as text.
  Text,
  /// Collect stdout as raw bytes.
  Bytes,
  /// Redirect stdout into the given file.
  File(&'a Path),
}

/// Result of a successful invocation, matching the requested [`Capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
  Inherited,
  Text(String),
  Bytes(Vec<u8>),
  File(PathBuf),
}

impl Output {
  pub fn into_text(self) -> Option<String> {
    match self {
      Output::Text(text) => Some(text),
      _ => None,
    }
  }

  /// Captured stdout, whether it was requested as text or as bytes.
  pub fn into_bytes(self) -> Option<Vec<u8>> {
    match self {
      Output::Text(text) => Some(text.into_bytes()),
      Output::Bytes(bytes) => Some(bytes),
      _ => None,
    }
  }
}

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The program could not be started at all.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The command ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  Failed { cmd: String, code: Option<i32> },

  /// Standard output could not be redirected into its destination.
  #[error("failed to redirect output of `{cmd}` to {path}: {source}")]
  Redirect {
    cmd: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Captured output was expected to be text.
  #[error("command produced non-UTF-8 output: {cmd}")]
  NonUtf8 { cmd: String },
}

/// Runs invocations to completion.
///
/// [`SystemRunner`] spawns real processes; tests substitute scripted runners.
#[allow(async_fn_in_trait)]
pub trait Runner {
  async fn run(&self, invocation: &Invocation, capture: Capture<'_>) -> Result<Output, ProcessError>;
}

impl<R: Runner> Runner for &R {
  async fn run(&self, invocation: &Invocation, capture: Capture<'_>) -> Result<Output, ProcessError> {
    (**self).run(invocation, capture).await
  }
}

/// Spawns invocations as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
  async fn run(&self, invocation: &Invocation, capture: Capture<'_>) -> Result<Output, ProcessError> {
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).stdin(Stdio::inherit()).stderr(Stdio::inherit());
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    debug!(cmd = %invocation, cwd = ?invocation.cwd, "spawning process");

    match capture {
      Capture::Inherit => {
        let status = command.status().await.map_err(|e| spawn_error(invocation, e))?;
        check_status(invocation, status)?;
        Ok(Output::Inherited)
      }

      Capture::Text => {
        command.stdout(Stdio::piped());
        let output = command.output().await.map_err(|e| spawn_error(invocation, e))?;
        check_status(invocation, output.status)?;

        let text = String::from_utf8(output.stdout).map_err(|_| ProcessError::NonUtf8 {
          cmd: invocation.command_line(),
        })?;
        if !text.is_empty() {
          debug!(stdout = %text, "command output");
        }
        Ok(Output::Text(text))
      }

      Capture::Bytes => {
        command.stdout(Stdio::piped());
        let output = command.output().await.map_err(|e| spawn_error(invocation, e))?;
        check_status(invocation, output.status)?;
        debug!(bytes = output.stdout.len(), "command output");
        Ok(Output::Bytes(output.stdout))
      }

      Capture::File(dest) => {
        let redirect_error = |source: io::Error| ProcessError::Redirect {
          cmd: invocation.command_line(),
          path: dest.to_path_buf(),
          source,
        };

        let staged = staging_file(dest).map_err(redirect_error)?;
        let stdout = staged.as_file().try_clone().map_err(redirect_error)?;
        command.stdout(Stdio::from(stdout));

        // On failure the staged file is dropped, leaving `dest` untouched.
        let status = command.status().await.map_err(|e| spawn_error(invocation, e))?;
        check_status(invocation, status)?;

        persist(staged, dest).map_err(redirect_error)?;
        debug!(path = %dest.display(), "redirected output");
        Ok(Output::File(dest.to_path_buf()))
      }
    }
  }
}

fn spawn_error(invocation: &Invocation, source: io::Error) -> ProcessError {
  ProcessError::Spawn {
    program: invocation.program.display().to_string(),
    source,
  }
}

fn check_status(invocation: &Invocation, status: ExitStatus) -> Result<(), ProcessError> {
  if status.success() {
    return Ok(());
  }

  debug!(cmd = %invocation, status = %status, "command failed");
  Err(ProcessError::Failed {
    cmd: invocation.command_line(),
    code: status.code(),
  })
}

/// Runs invocations one at a time, optionally echoing each command line.
#[derive(Debug, Clone, Default)]
pub struct Invoker<R = SystemRunner> {
  runner: R,
  echo: bool,
}

impl<R: Runner> Invoker<R> {
  pub fn new(runner: R, echo: bool) -> Self {
    Self { runner, echo }
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Run `invocation` to completion.
  ///
  /// Blocks the calling stage until the command exits. A nonzero exit is
  /// returned as [`ProcessError::Failed`]; nothing is retried.
  pub async fn execute(&self, invocation: &Invocation, capture: Capture<'_>) -> Result<Output, ProcessError> {
    if self.echo {
      eprintln!("+ {}", invocation);
    }
    self.runner.run(invocation, capture).await
  }
}
