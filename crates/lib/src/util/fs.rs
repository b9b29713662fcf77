//! Write-then-rename helpers.
//!
//! Every file this crate produces is first written to a temporary sibling of
//! its destination and renamed into place once complete, so readers never
//! observe a partially written file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Create a temporary file in the same directory as `dest`.
///
/// Missing parent directories are created. The returned file is removed when
/// dropped unless it is persisted.
pub fn staging_file(dest: &Path) -> io::Result<NamedTempFile> {
  let parent = match dest.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(parent)?;
  NamedTempFile::new_in(parent)
}

/// Atomically move a staged file onto `dest`, replacing any existing file.
pub fn persist(staged: NamedTempFile, dest: &Path) -> io::Result<()> {
  staged.persist(dest).map_err(|e| e.error)?;
  Ok(())
}

/// Write `contents` to `dest` through a staging file.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> io::Result<()> {
  let mut staged = staging_file(dest)?;
  staged.write_all(contents)?;
  staged.as_file().sync_all()?;
  persist(staged, dest)
}

/// Copy `src` over `dest` through a staging file.
///
/// Permissions of `src` are carried over so executables stay executable.
pub fn copy_atomic(src: &Path, dest: &Path) -> io::Result<()> {
  let mut staged = staging_file(dest)?;
  let mut input = fs::File::open(src)?;
  io::copy(&mut input, staged.as_file_mut())?;
  staged.as_file().sync_all()?;
  fs::set_permissions(staged.path(), input.metadata()?.permissions())?;
  persist(staged, dest)
}
