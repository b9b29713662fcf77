//! Content digests for build artifacts.
//!
//! Digests only annotate reports and error messages; artifact equality is
//! always decided on the raw bytes (see [`crate::artifact::identical`]).

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::DIGEST_PREFIX_LEN;

/// A full 64-character SHA-256 hash of a file's contents.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// The leading characters shown in log lines.
  pub fn short(&self) -> &str {
    let len = self.0.len().min(DIGEST_PREFIX_LEN);
    &self.0[..len]
  }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Stream a file through SHA-256.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut reader = io::BufReader::new(fs::File::open(path)?);
  let mut hasher = Sha256::new();
  io::copy(&mut reader, &mut hasher)?;
  Ok(ContentHash(hex::encode(hasher.finalize())))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}
