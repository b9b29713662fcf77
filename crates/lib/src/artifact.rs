//! Build artifact addressing.
//!
//! An artifact is identified by the package that contains its source and the
//! name of the entry point, and lives at `<package>/build/<binary>.ofta`.
//! Intermediate generations of the same artifact get a numeric suffix
//! (`<binary>-2.ofta`, `<binary>-3.ofta`) so stages never overwrite each
//! other's output before promotion.

use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{ARTIFACT_EXT, BUILD_DIR};
use crate::util::fs::copy_atomic;
use crate::util::hash::{ContentHash, hash_file};

#[derive(Debug, Error)]
pub enum ArtifactError {
  /// A stage reported success but its artifact is not on disk.
  #[error("artifact {key} was not produced at {path}")]
  Missing { key: String, path: PathBuf },

  #[error("failed to read artifact {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to promote {from} to {to}: {source}")]
  Promote {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove artifact {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// `(package, binary)` pair naming one compiled entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactKey {
  /// Package directory, relative to the pipeline root.
  pub package: PathBuf,
  pub binary: String,
}

impl ArtifactKey {
  pub fn new(package: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
    Self {
      package: package.into(),
      binary: binary.into(),
    }
  }

  /// The package path as passed on a toolchain command line.
  pub fn package_arg(&self) -> String {
    self.package.to_string_lossy().into_owned()
  }
}

impl fmt::Display for ArtifactKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.package.display(), self.binary)
  }
}

/// A resolved artifact location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
  pub key: ArtifactKey,
  /// Generation suffix; `None` for the canonical artifact.
  pub variant: Option<u32>,
  /// Path relative to the pipeline root, as handed to the toolchain.
  pub relative: PathBuf,
  /// Absolute path, for filesystem operations.
  pub path: PathBuf,
}

impl ArtifactRef {
  /// File name without extension, e.g. `oftb-macro-expander-2`.
  pub fn stem(&self) -> String {
    artifact_stem(&self.key.binary, self.variant)
  }

  pub fn is_canonical(&self) -> bool {
    self.variant.is_none()
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// The relative path as passed on a toolchain command line.
  pub fn path_arg(&self) -> String {
    self.relative.to_string_lossy().into_owned()
  }

  pub fn digest(&self) -> Result<ContentHash, ArtifactError> {
    hash_file(&self.path).map_err(|source| ArtifactError::Read {
      path: self.path.clone(),
      source,
    })
  }
}

fn artifact_stem(binary: &str, variant: Option<u32>) -> String {
  match variant {
    Some(n) => format!("{}-{}", binary, n),
    None => binary.to_string(),
  }
}

/// Maps artifact keys to paths under a pipeline root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// The canonical artifact for `key`.
  pub fn artifact(&self, key: &ArtifactKey) -> ArtifactRef {
    self.resolve(key, None)
  }

  /// Generation `n` of the artifact for `key`.
  pub fn variant(&self, key: &ArtifactKey, n: u32) -> ArtifactRef {
    self.resolve(key, Some(n))
  }

  fn resolve(&self, key: &ArtifactKey, variant: Option<u32>) -> ArtifactRef {
    let file_name = format!("{}.{}", artifact_stem(&key.binary, variant), ARTIFACT_EXT);
    let relative = key.package.join(BUILD_DIR).join(file_name);
    ArtifactRef {
      key: key.clone(),
      variant,
      path: self.root.join(&relative),
      relative,
    }
  }

  /// Fail unless `artifact` exists on disk.
  pub fn require(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
    if artifact.exists() {
      Ok(())
    } else {
      Err(ArtifactError::Missing {
        key: artifact.key.to_string(),
        path: artifact.path.clone(),
      })
    }
  }

  /// Copy `from` over `to` atomically.
  pub fn promote(&self, from: &ArtifactRef, to: &ArtifactRef) -> Result<(), ArtifactError> {
    self.require(from)?;
    copy_atomic(&from.path, &to.path).map_err(|source| ArtifactError::Promote {
      from: from.path.clone(),
      to: to.path.clone(),
      source,
    })?;
    debug!(from = %from.relative.display(), to = %to.relative.display(), "promoted artifact");
    Ok(())
  }

  pub fn remove(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
    fs::remove_file(&artifact.path).map_err(|source| ArtifactError::Remove {
      path: artifact.path.clone(),
      source,
    })
  }

  /// Delete `artifact` if it exists, so a later [`require`](Self::require)
  /// only passes for freshly written output.
  pub fn discard(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
    match fs::remove_file(&artifact.path) {
      Err(source) if source.kind() != io::ErrorKind::NotFound => Err(ArtifactError::Remove {
        path: artifact.path.clone(),
        source,
      }),
      _ => Ok(()),
    }
  }
}

/// Byte-for-byte comparison of two artifacts.
pub fn identical(a: &ArtifactRef, b: &ArtifactRef) -> Result<bool, ArtifactError> {
  let len_a = fs::metadata(&a.path).map_err(read_error(&a.path))?.len();
  let len_b = fs::metadata(&b.path).map_err(read_error(&b.path))?.len();
  if len_a != len_b {
    return Ok(false);
  }

  let mut reader_a = BufReader::new(fs::File::open(&a.path).map_err(read_error(&a.path))?);
  let mut reader_b = BufReader::new(fs::File::open(&b.path).map_err(read_error(&b.path))?);
  let mut buf_a = [0u8; 8192];
  let mut buf_b = [0u8; 8192];

  loop {
    let n = reader_a.read(&mut buf_a).map_err(read_error(&a.path))?;
    if n == 0 {
      return Ok(true);
    }
    reader_b.read_exact(&mut buf_b[..n]).map_err(read_error(&b.path))?;
    if buf_a[..n] != buf_b[..n] {
      return Ok(false);
    }
  }
}

fn read_error(path: &Path) -> impl FnOnce(io::Error) -> ArtifactError {
  let path = path.to_path_buf();
  move |source| ArtifactError::Read { path, source }
}
