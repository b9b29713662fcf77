//! Fixed names and layout conventions of the oftb source tree.

/// Name of the native toolchain executable, both in `target/release` and in the archive.
pub const TOOLCHAIN_BIN_NAME: &str = "oftb";

/// Extension of compiled artifacts.
pub const ARTIFACT_EXT: &str = "ofta";

/// Directory inside a package holding its compiled artifacts.
pub const BUILD_DIR: &str = "build";

pub const STD_PACKAGE: &str = "ministd";
pub const EXPANDER_PACKAGE: &str = "macro-expander";
pub const EXPANDER_BINARY: &str = "oftb-macro-expander";
pub const PRELUDE_GENERATOR: &str = "make-prelude";
pub const PRELUDE_PATH: &str = "ministd/src/prelude.oft";

pub const SELF_TEST_PACKAGE: &str = "examples/structure";
pub const SELF_TEST_BINARY: &str = "structure";

pub const ARCHIVE_NAME: &str = "oftb.tar.gz";

/// Overrides the pipeline root directory.
pub const ROOT_ENV: &str = "OFTB_BOOTSTRAP_ROOT";

/// Points at a pre-built toolchain binary, skipping the native build.
pub const TOOLCHAIN_ENV: &str = "OFTB_BOOTSTRAP_TOOLCHAIN";

/// Length of the digest prefix shown in logs.
pub const DIGEST_PREFIX_LEN: usize = 12;
