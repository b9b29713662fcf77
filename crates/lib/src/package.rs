//! Distribution archive.
//!
//! Bundles the native toolchain binary and the source trees it needs at run
//! time into one gzip-compressed tarball:
//!
//! ```text
//! oftb.tar.gz
//! ├── oftb
//! ├── macro-expander/...
//! └── ministd/...
//! ```
//!
//! Entries are added in sorted order with deterministic headers, so the same
//! inputs always produce the same archive bytes.

use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tar::{Builder, HeaderMode};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::BootstrapConfig;
use crate::consts::{ARCHIVE_NAME, TOOLCHAIN_BIN_NAME};
use crate::util::fs::{persist, staging_file};
use crate::util::hash::{ContentHash, hash_file};

#[derive(Debug, Error)]
pub enum PackageError {
  /// An input was absent; nothing was written.
  #[error("cannot package missing input: {0}")]
  MissingInput(PathBuf),

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to write archive {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// What goes into the archive and where it is written.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
  /// Native toolchain binary; stored as `oftb`.
  pub executable: PathBuf,
  /// Directory the source trees are relative to.
  pub root: PathBuf,
  /// Source trees, stored under their root-relative paths.
  pub trees: Vec<PathBuf>,
  pub output: PathBuf,
}

impl ArchiveSpec {
  /// The standard archive for `config`, written to `output` or `<root>/oftb.tar.gz`.
  pub fn from_config(config: &BootstrapConfig, executable: PathBuf, output: Option<PathBuf>) -> Self {
    Self {
      executable,
      root: config.root.clone(),
      trees: config.source_trees(),
      output: output.unwrap_or_else(|| config.root.join(ARCHIVE_NAME)),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
  pub path: PathBuf,
  pub entries: usize,
  pub bytes: u64,
  pub digest: ContentHash,
}

/// Write the archive described by `spec`.
///
/// All inputs are checked before anything is written. The archive is built in
/// a temporary file next to `spec.output` and renamed into place only when
/// complete.
pub fn make_archive(spec: &ArchiveSpec) -> Result<ArchiveReport, PackageError> {
  if !spec.executable.is_file() {
    return Err(PackageError::MissingInput(spec.executable.clone()));
  }
  for tree in &spec.trees {
    if !spec.root.join(tree).is_dir() {
      return Err(PackageError::MissingInput(tree.clone()));
    }
  }

  let write_error = |source: io::Error| PackageError::Write {
    path: spec.output.clone(),
    source,
  };

  let staged = staging_file(&spec.output).map_err(write_error)?;
  let encoder = GzEncoder::new(staged.as_file(), Compression::default());
  let mut builder = Builder::new(encoder);
  builder.mode(HeaderMode::Deterministic);

  builder
    .append_path_with_name(&spec.executable, TOOLCHAIN_BIN_NAME)
    .map_err(write_error)?;
  let mut entries = 1;

  // The output may live inside a packaged tree; never archive it or its staging file.
  let skip = [
    path::absolute(&spec.output).map_err(write_error)?,
    path::absolute(staged.path()).map_err(write_error)?,
  ];
  for tree in &spec.trees {
    entries += append_tree(&mut builder, &spec.root, tree, &spec.output, &skip)?;
  }

  let encoder = builder.into_inner().map_err(write_error)?;
  encoder.finish().map_err(write_error)?;
  staged.as_file().sync_all().map_err(write_error)?;
  persist(staged, &spec.output).map_err(write_error)?;

  let bytes = fs::metadata(&spec.output).map_err(write_error)?.len();
  let digest = hash_file(&spec.output).map_err(write_error)?;
  info!(path = %spec.output.display(), entries, bytes, "archive written");

  Ok(ArchiveReport {
    path: spec.output.clone(),
    entries,
    bytes,
    digest,
  })
}

/// Append `tree` and everything below it, in file-name order.
fn append_tree<W: io::Write>(
  builder: &mut Builder<W>,
  root: &Path,
  tree: &Path,
  output: &Path,
  skip: &[PathBuf],
) -> Result<usize, PackageError> {
  let write_error = |source: io::Error| PackageError::Write {
    path: output.to_path_buf(),
    source,
  };
  let base = path::absolute(root.join(tree)).map_err(write_error)?;
  let mut count = 0;

  for entry in WalkDir::new(&base).sort_by_file_name() {
    let entry = entry.map_err(|source| PackageError::Walk {
      path: base.clone(),
      source,
    })?;
    let path = entry.path();
    if skip.iter().any(|skipped| skipped == path) {
      continue;
    }

    let relative = path.strip_prefix(&base).unwrap_or(path);
    let name = tree.join(relative);

    if entry.file_type().is_dir() {
      builder.append_dir(&name, path).map_err(write_error)?;
    } else {
      builder.append_path_with_name(path, &name).map_err(write_error)?;
    }
    debug!(entry = %name.display(), "archived");
    count += 1;
  }

  Ok(count)
}
